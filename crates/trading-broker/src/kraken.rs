//! Kraken spot REST integration.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{header, Client};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};
use trading_core::error::{BrokerError, DataError};
use trading_core::traits::{Account, MarketData};
use trading_core::types::{
    is_ascending, Balances, Candle, Order, OrderAck, OrderRequest, OrderStatus, OrderType, Side,
    Timeframe,
};

use crate::auth::{encode_form, sign, NonceGenerator};

/// Public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.kraken.com";

/// Kraken API configuration.
#[derive(Debug, Clone)]
pub struct KrakenConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Applied to every request, connect to last body byte
    pub timeout: Duration,
}

impl Default for KrakenConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_secret: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl KrakenConfig {
    /// Config for public market data only.
    pub fn public(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            ..Self::default()
        }
    }

    /// Attach API credentials for the private endpoints.
    pub fn with_credentials(mut self, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }
}

/// Kraken response envelope.
#[derive(Debug, Deserialize)]
struct KrakenResponse<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KrakenOrderDescription {
    pair: String,
    #[serde(rename = "type")]
    side: String,
    ordertype: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    order: String,
}

#[derive(Debug, Deserialize)]
struct KrakenOrder {
    status: String,
    #[serde(default, deserialize_with = "de_timestamp")]
    opentm: Option<f64>,
    #[serde(default, deserialize_with = "de_timestamp")]
    closetm: Option<f64>,
    #[serde(default, deserialize_with = "de_timestamp")]
    expiretm: Option<f64>,
    descr: KrakenOrderDescription,
    vol: String,
    vol_exec: String,
    /// Average price of the executed volume
    #[serde(default)]
    price: String,
}

#[derive(Debug, Deserialize)]
struct OpenOrdersResult {
    #[serde(default)]
    open: HashMap<String, KrakenOrder>,
}

#[derive(Debug, Deserialize)]
struct ClosedOrdersResult {
    #[serde(default)]
    closed: HashMap<String, KrakenOrder>,
}

#[derive(Debug, Deserialize)]
struct AddOrderDescription {
    #[serde(default)]
    order: String,
}

#[derive(Debug, Deserialize)]
struct AddOrderResult {
    descr: AddOrderDescription,
    #[serde(default)]
    txid: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(f64),
    Str(String),
}

/// Kraken sends times as float seconds, sometimes quoted; 0 means unset.
fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumOrStr>::deserialize(deserializer)?;
    let secs = match raw {
        Some(NumOrStr::Num(n)) => Some(n),
        Some(NumOrStr::Str(s)) => s.parse::<f64>().ok(),
        None => None,
    };
    Ok(secs.filter(|t| *t > 0.0))
}

fn to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos).single()
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, BrokerError> {
    raw.parse()
        .map_err(|_| BrokerError::ApiError(format!("invalid {} '{}'", field, raw)))
}

fn positive(raw: &str) -> Option<Decimal> {
    raw.parse::<Decimal>().ok().filter(|d| *d > Decimal::ZERO)
}

fn convert_order(id: String, raw: KrakenOrder) -> Result<Order, BrokerError> {
    let side = match raw.descr.side.as_str() {
        "buy" => Side::Buy,
        "sell" => Side::Sell,
        other => return Err(BrokerError::ApiError(format!("Unknown side: {}", other))),
    };
    let order_type = match raw.descr.ordertype.as_str() {
        "market" => OrderType::Market,
        "limit" => OrderType::Limit,
        other => {
            return Err(BrokerError::ApiError(format!("Unsupported order type: {}", other)))
        }
    };
    let status: OrderStatus = raw.status.parse().map_err(BrokerError::ApiError)?;

    Ok(Order {
        id,
        pair: raw.descr.pair,
        side,
        order_type,
        volume: parse_decimal("vol", &raw.vol)?,
        volume_executed: parse_decimal("vol_exec", &raw.vol_exec)?,
        limit_price: positive(&raw.descr.price),
        avg_price: positive(&raw.price),
        status,
        opened_at: raw.opentm.and_then(to_datetime),
        closed_at: raw.closetm.and_then(to_datetime),
        expires_at: raw.expiretm.and_then(to_datetime),
        description: raw.descr.order,
    })
}

/// Convert an order map, newest first. Orders the bot never places
/// (stop-loss, margin, ...) are skipped.
fn convert_orders(raw: HashMap<String, KrakenOrder>) -> Vec<Order> {
    let mut orders: Vec<Order> = raw
        .into_iter()
        .filter_map(|(id, o)| match convert_order(id.clone(), o) {
            Ok(order) => Some(order),
            Err(e) => {
                debug!(order_id = %id, "Skipping order: {}", e);
                None
            }
        })
        .collect();
    orders.sort_by(|a, b| {
        let key = |o: &Order| o.closed_at.or(o.opened_at);
        key(b).cmp(&key(a))
    });
    orders
}

fn parse_balances(raw: HashMap<String, String>) -> Result<Balances, BrokerError> {
    raw.into_iter()
        .map(|(asset, amount)| {
            let available = parse_decimal(&asset, &amount)?;
            Ok::<_, BrokerError>((asset, available))
        })
        .collect()
}

fn ohlc_number(field: &Value) -> Result<f64, DataError> {
    match field {
        Value::String(s) => s
            .parse()
            .map_err(|_| DataError::Parse(format!("invalid OHLC value '{}'", s))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DataError::Parse(format!("invalid OHLC value {}", n))),
        other => Err(DataError::Parse(format!("invalid OHLC value {}", other))),
    }
}

fn parse_ohlc_row(row: &Value) -> Result<Candle, DataError> {
    let fields = row
        .as_array()
        .filter(|f| f.len() >= 7)
        .ok_or_else(|| DataError::Parse(format!("malformed OHLC row {}", row)))?;
    let timestamp = fields[0]
        .as_i64()
        .ok_or_else(|| DataError::Parse(format!("invalid OHLC time {}", fields[0])))?;

    // [time, open, high, low, close, vwap, volume, count]
    Ok(Candle::new(
        timestamp,
        ohlc_number(&fields[1])?,
        ohlc_number(&fields[2])?,
        ohlc_number(&fields[3])?,
        ohlc_number(&fields[4])?,
        ohlc_number(&fields[6])?,
    ))
}

/// Candles from an OHLC result, ascending.
fn parse_ohlc(pair: &str, result: HashMap<String, Value>) -> Result<Vec<Candle>, DataError> {
    let rows = result
        .into_iter()
        .find(|(key, _)| key != "last")
        .map(|(_, rows)| rows)
        .ok_or_else(|| DataError::NoDataAvailable(pair.to_string()))?;
    let rows = rows
        .as_array()
        .ok_or_else(|| DataError::Parse("OHLC rows are not an array".into()))?;

    let mut candles = rows.iter().map(parse_ohlc_row).collect::<Result<Vec<_>, _>>()?;
    if !is_ascending(&candles) {
        candles.sort_by_key(|c| c.timestamp);
    }
    Ok(candles)
}

fn api_error(method: &str, errors: &[String]) -> BrokerError {
    let joined = errors.join("; ");
    let any = |prefixes: &[&str]| {
        errors
            .iter()
            .any(|e| prefixes.iter().any(|p| e.starts_with(p)))
    };

    if any(&[
        "EAPI:Invalid key",
        "EAPI:Invalid signature",
        "EAPI:Invalid nonce",
        "EGeneral:Permission denied",
    ]) {
        BrokerError::AuthenticationError(joined)
    } else if errors.iter().any(|e| e.contains("Rate limit exceeded")) {
        BrokerError::RateLimited(joined)
    } else if method == "AddOrder" {
        BrokerError::OrderRejected(joined)
    } else if method == "QueryOrders" && any(&["EOrder:Unknown order", "EOrder:Invalid order"]) {
        BrokerError::OrderNotFound(joined)
    } else {
        BrokerError::ApiError(format!("{}: {}", method, joined))
    }
}

fn unwrap_response<T>(method: &str, body: KrakenResponse<T>) -> Result<T, BrokerError> {
    if !body.error.is_empty() {
        return Err(api_error(method, &body.error));
    }
    body.result
        .ok_or_else(|| BrokerError::ApiError(format!("{}: empty result", method)))
}

fn transport_error(e: reqwest::Error) -> BrokerError {
    if e.is_timeout() {
        BrokerError::Timeout(e.to_string())
    } else {
        BrokerError::Connection(e.to_string())
    }
}

fn to_data_error(e: BrokerError) -> DataError {
    match e {
        BrokerError::Connection(_)
        | BrokerError::Timeout(_)
        | BrokerError::AuthenticationError(_)
        | BrokerError::RateLimited(_) => DataError::Transport(e.to_string()),
        other => DataError::NoDataAvailable(other.to_string()),
    }
}

/// Form parameters for `AddOrder`, nonce excluded.
fn order_params(request: &OrderRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("ordertype", request.order_type.as_str().to_string()),
        ("type", request.side.as_str().to_string()),
        ("volume", request.volume.normalize().to_string()),
        ("pair", request.pair.clone()),
    ];
    if let Some(price) = request.price {
        params.push(("price", price.normalize().to_string()));
    }
    if let Some(price2) = request.price2 {
        params.push(("price2", price2.normalize().to_string()));
    }
    if let Some(tif) = request.time_in_force {
        params.push(("timeinforce", tif.as_str().to_string()));
    }
    if let Some(expiry) = request.expiry {
        params.push(("expiretm", expiry.to_string()));
    }
    if request.validate {
        params.push(("validate", "true".to_string()));
    }
    params
}

/// Kraken client implementing both market data and account access.
pub struct KrakenClient {
    config: KrakenConfig,
    client: Client,
    nonces: NonceGenerator,
}

impl KrakenClient {
    /// Create a new Kraken client.
    pub fn new(config: KrakenConfig) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("intraday-trader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(Self {
            config,
            client,
            nonces: NonceGenerator::new(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.config.api_key.is_some() && self.config.api_secret.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn public<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, BrokerError> {
        let url = self.url(&format!("/0/public/{}", method));
        let resp = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read(method, resp).await
    }

    async fn private<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, BrokerError> {
        let (api_key, api_secret) = match (&self.config.api_key, &self.config.api_secret) {
            (Some(key), Some(secret)) => (key, secret),
            _ => {
                return Err(BrokerError::Configuration(format!(
                    "{} requires API credentials",
                    method
                )))
            }
        };

        let path = format!("/0/private/{}", method);
        let nonce = self.nonces.next();
        let mut form = vec![("nonce", nonce.to_string())];
        form.extend(params.iter().cloned());
        let body = encode_form(&form);
        let signature = sign(&path, nonce, &body, api_secret)?;

        debug!(method, "Kraken private call");
        let resp = self
            .client
            .post(self.url(&path))
            .header("API-Key", api_key.as_str())
            .header("API-Sign", signature)
            .header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded; charset=utf-8",
            )
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read(method, resp).await
    }

    async fn read<T: DeserializeOwned>(
        method: &str,
        resp: reqwest::Response,
    ) -> Result<T, BrokerError> {
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BrokerError::ApiError(format!("{} {}: {}", method, status, text)));
        }

        let body: KrakenResponse<T> = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                BrokerError::Timeout(e.to_string())
            } else {
                BrokerError::ApiError(format!("{}: {}", method, e))
            }
        })?;
        unwrap_response(method, body)
    }
}

#[async_trait]
impl MarketData for KrakenClient {
    async fn candles(&self, pair: &str, timeframe: Timeframe) -> Result<Vec<Candle>, DataError> {
        let params = [
            ("pair", pair.to_string()),
            ("interval", timeframe.as_minutes().to_string()),
        ];
        let result: HashMap<String, Value> =
            self.public("OHLC", &params).await.map_err(to_data_error)?;
        let candles = parse_ohlc(pair, result)?;
        debug!(pair, count = candles.len(), "Fetched candles");
        Ok(candles)
    }

    fn name(&self) -> &str {
        "Kraken"
    }
}

#[async_trait]
impl Account for KrakenClient {
    async fn balances(&self) -> Result<Balances, BrokerError> {
        let raw: HashMap<String, String> = self.private("Balance", &[]).await?;
        parse_balances(raw)
    }

    async fn open_orders(&self) -> Result<Vec<Order>, BrokerError> {
        let result: OpenOrdersResult = self.private("OpenOrders", &[]).await?;
        Ok(convert_orders(result.open))
    }

    async fn closed_orders(&self) -> Result<Vec<Order>, BrokerError> {
        let result: ClosedOrdersResult = self.private("ClosedOrders", &[]).await?;
        Ok(convert_orders(result.closed))
    }

    async fn order_info(&self, order_id: &str) -> Result<Order, BrokerError> {
        let params = [("txid", order_id.to_string())];
        let mut result: HashMap<String, KrakenOrder> = self.private("QueryOrders", &params).await?;
        let raw = result
            .remove(order_id)
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))?;
        convert_order(order_id.to_string(), raw)
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, BrokerError> {
        let params = order_params(request);
        debug!("Submitting order: {:?}", params);

        let result: AddOrderResult = self.private("AddOrder", &params).await?;
        info!(
            txids = ?result.txid,
            validate = request.validate,
            "Order accepted: {}",
            result.descr.order
        );
        Ok(OrderAck {
            txids: result.txid,
            description: result.descr.order,
        })
    }

    fn name(&self) -> &str {
        "Kraken"
    }
}
