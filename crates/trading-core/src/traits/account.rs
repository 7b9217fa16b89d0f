//! Account capability.

use crate::error::BrokerError;
use crate::types::{Balances, Order, OrderAck, OrderRequest};
use async_trait::async_trait;

/// Trait for exchange accounts.
///
/// Accounts report balances and order state and accept new orders. Nothing
/// here is cached: every call reflects the exchange at the time of the call.
#[async_trait]
pub trait Account: Send + Sync {
    /// Get available volume per asset.
    async fn balances(&self) -> Result<Balances, BrokerError>;

    /// Get all open orders, across every pair.
    async fn open_orders(&self) -> Result<Vec<Order>, BrokerError>;

    /// Get recently closed orders, most recent first.
    async fn closed_orders(&self) -> Result<Vec<Order>, BrokerError>;

    /// Look up a single order, including its realised price.
    ///
    /// # Arguments
    /// * `order_id` - The exchange id of the order
    async fn order_info(&self, order_id: &str) -> Result<Order, BrokerError>;

    /// Submit a new order.
    ///
    /// # Arguments
    /// * `request` - The order request to submit
    ///
    /// # Returns
    /// The transaction ids and the exchange's description of the order.
    /// A validate-only request returns no ids.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, BrokerError>;

    /// Get the account provider name.
    fn name(&self) -> &str;
}
