//! Error types for the trading bot.

use thiserror::Error;

/// Coarse classification used by the scheduler to decide how loudly to
/// report a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty or short candle series, missing balance row. Skip the cycle.
    DataUnavailable,
    /// The exchange refused an order placement.
    OrderRejected,
    /// Account state that the bot cannot explain. Needs an operator.
    InconsistentState,
    /// Network, timeout or authentication failure talking to the exchange.
    TransportFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::OrderRejected => "order_rejected",
            ErrorKind::InconsistentState => "inconsistent_state",
            ErrorKind::TransportFailure => "transport_failure",
        };
        write!(f, "{}", s)
    }
}

/// Top-level trading bot error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Inconsistent account state: {reason}")]
    InconsistentState { reason: String },

    #[error("Unhedged position after order {order_id}: {reason}")]
    UnhedgedPosition { order_id: String, reason: String },
}

impl TradingError {
    /// Map the error onto the cycle failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TradingError::Broker(e) => e.kind(),
            TradingError::Data(DataError::Transport(_)) => ErrorKind::TransportFailure,
            TradingError::Data(_) => ErrorKind::DataUnavailable,
            TradingError::InconsistentState { .. } | TradingError::UnhedgedPosition { .. } => {
                ErrorKind::InconsistentState
            }
            TradingError::Config(_) | TradingError::Strategy(_) => ErrorKind::DataUnavailable,
        }
    }

    /// Whether a human has to look at the account before trading is safe.
    pub fn requires_operator(&self) -> bool {
        matches!(
            self,
            TradingError::InconsistentState { .. } | TradingError::UnhedgedPosition { .. }
        )
    }
}

/// Strategy-specific errors.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown indicator label: {0}")]
    UnknownLabel(String),
}

/// Errors reported by an exchange adapter.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::OrderRejected(_) => ErrorKind::OrderRejected,
            BrokerError::OrderNotFound(_) | BrokerError::ApiError(_) => {
                ErrorKind::DataUnavailable
            }
            BrokerError::Configuration(_)
            | BrokerError::Connection(_)
            | BrokerError::Timeout(_)
            | BrokerError::AuthenticationError(_)
            | BrokerError::RateLimited(_) => ErrorKind::TransportFailure,
        }
    }
}

/// Market and account data errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("No data available for {0}")]
    NoDataAvailable(String),

    #[error("Insufficient data: need {required} candles, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("No balance reported for {0}")]
    MissingBalance(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;
