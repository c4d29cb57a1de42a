//! Quote-checked execution of trade intents.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trading_core::traits::{Broker, Quote};
use trading_core::types::{ExecutionResult, OrderRequest, Rejection, Side, TradeIntent};

/// Gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Accept only when the quote deviates from the reference price by
    /// strictly less than this fraction
    pub percent_range_execute_limit: f64,
    /// Cash committed to each buy
    pub cash_limit: Decimal,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            percent_range_execute_limit: 0.05,
            cash_limit: Decimal::from(100),
        }
    }
}

/// Validates intents against live quotes and submits market orders.
///
/// The gate never retries: broker failures come back as a rejected result
/// and the caller decides whether to try again later.
#[derive(Debug, Clone)]
pub struct ExecutionGate {
    config: GateConfig,
}

impl ExecutionGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// max(a, b) / min(a, b) - 1. Non-positive prices deviate infinitely.
    pub fn deviation(reference_price: f64, quote_price: f64) -> f64 {
        let high = reference_price.max(quote_price);
        let low = reference_price.min(quote_price);
        if low <= 0.0 || !low.is_finite() || !high.is_finite() {
            return f64::INFINITY;
        }
        high / low - 1.0
    }

    /// Deviation of the side of `quote` an order for `side` would hit.
    pub fn quote_deviation(intent: &TradeIntent, quote: &Quote) -> f64 {
        let quote_price = match intent.side {
            Side::Buy => quote.ask,
            Side::Sell => quote.bid,
        };
        Self::deviation(intent.reference_price, quote_price)
    }

    /// Whole shares of a buy at `ask` under the cash limit.
    pub fn buy_quantity(&self, ask: f64) -> Decimal {
        match Decimal::from_f64(ask) {
            Some(ask) if ask > Decimal::ZERO => self
                .config
                .cash_limit
                .checked_div(ask)
                .map(|q| q.floor())
                .unwrap_or(Decimal::ZERO),
            _ => Decimal::ZERO,
        }
    }

    /// Run `intent` through the gate against `quote`, submitting to `broker`
    /// on acceptance.
    pub async fn execute(
        &self,
        intent: &TradeIntent,
        quote: Quote,
        broker: &dyn Broker,
    ) -> ExecutionResult {
        let deviation = Self::quote_deviation(intent, &quote);
        let mut result = ExecutionResult {
            intent: intent.clone(),
            matched_quote: quote,
            deviation_pct: deviation,
            accepted: false,
            rejection: None,
            order_id: None,
            filled_price: None,
            quantity: None,
        };

        let limit = self.config.percent_range_execute_limit;
        if !(deviation < limit) {
            return reject(result, Rejection::DeviationExceeded { deviation, limit });
        }

        let (quantity, price) = match intent.side {
            Side::Buy => {
                let quantity = self.buy_quantity(result.matched_quote.ask);
                if quantity.is_zero() {
                    return reject(result, Rejection::ZeroQuantity);
                }
                (quantity, result.matched_quote.ask)
            }
            Side::Sell => match broker.get_position(&intent.symbol).await {
                Ok(Some(held)) if held > Decimal::ZERO => (held, result.matched_quote.bid),
                Ok(_) => return reject(result, Rejection::NoPosition),
                Err(e) => return reject(result, Rejection::Broker(e.to_string())),
            },
        };

        let mut request = OrderRequest::market(&intent.symbol, intent.side, quantity)
            .with_client_order_id(client_order_id(intent));
        if let Some(price) = Decimal::from_f64(price) {
            request = request.with_expected_price(price);
        }
        result.quantity = Some(quantity);

        debug!(
            symbol = %intent.symbol,
            side = %intent.side,
            quantity = %quantity,
            deviation,
            "Submitting order"
        );

        match broker.place_order(request).await {
            Ok(ack) => {
                info!(
                    symbol = %intent.symbol,
                    side = %intent.side,
                    order_id = %ack.order_id,
                    quantity = %ack.quantity,
                    "Order accepted by {}",
                    broker.name()
                );
                result.accepted = true;
                result.order_id = Some(ack.order_id);
                result.filled_price = ack.filled_price;
                result.quantity = Some(ack.quantity);
                result
            }
            Err(e) => reject(result, Rejection::Broker(e.to_string())),
        }
    }
}

fn reject(mut result: ExecutionResult, rejection: Rejection) -> ExecutionResult {
    warn!(
        symbol = %result.intent.symbol,
        timestamp = %result.intent.detected_at,
        side = %result.intent.side,
        reason = %rejection,
        "Execution rejected"
    );
    result.accepted = false;
    result.rejection = Some(rejection);
    result
}

/// Stable per-intent id so a broker can spot duplicate submissions.
fn client_order_id(intent: &TradeIntent) -> String {
    format!(
        "{}-{}-{}",
        intent.symbol,
        intent.detected_at.timestamp(),
        intent.side.to_string().to_lowercase()
    )
}
