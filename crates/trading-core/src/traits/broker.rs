//! Broker trait definition.

use crate::error::BrokerError;
use crate::types::{OrderAck, OrderRequest};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Trait for brokerage integrations.
///
/// Authentication and token refresh are the implementation's concern; callers
/// only submit orders and look up held quantity.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Submit a market order.
    ///
    /// # Returns
    /// The broker acknowledgement, or `BrokerError::Submission` carrying the
    /// status code when the broker answers with a non-success response.
    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck, BrokerError>;

    /// Get the quantity held for a symbol.
    ///
    /// # Returns
    /// `None` when there is no position (or it is flat).
    async fn get_position(&self, symbol: &str) -> Result<Option<Decimal>, BrokerError>;

    /// Get the broker name.
    fn name(&self) -> &str;
}
