//! Paper trading broker for backtesting and simulation.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use trading_core::error::BrokerError;
use trading_core::traits::Broker;
use trading_core::types::{OrderAck, OrderRequest, Side};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Account {
    cash: Decimal,
    holdings: HashMap<String, Decimal>,
    last_prices: HashMap<String, Decimal>,
    fills: Vec<OrderAck>,
    /// Status and message returned for every submission while set
    failure: Option<(u16, String)>,
}

/// Paper trading broker for simulation.
///
/// Market orders fill immediately at the request's expected price (or the
/// last price set for the symbol), adjusted by slippage. Commission is
/// charged per share on both sides.
#[derive(Clone)]
pub struct PaperBroker {
    account: Arc<Mutex<Account>>,
    slippage: Decimal,
    commission_per_share: Decimal,
}

impl PaperBroker {
    /// Create a new paper broker with initial capital.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            account: Arc::new(Mutex::new(Account {
                cash: initial_capital,
                ..Default::default()
            })),
            slippage: Decimal::ZERO,
            commission_per_share: Decimal::ZERO,
        }
    }

    /// Set slippage as a fraction of the price (0.01 is 1%).
    pub fn with_slippage(mut self, slippage: Decimal) -> Self {
        self.slippage = slippage;
        self
    }

    /// Set commission per share.
    pub fn with_commission(mut self, commission: Decimal) -> Self {
        self.commission_per_share = commission;
        self
    }

    /// Seed a held quantity without touching cash.
    pub fn with_position(self, symbol: &str, quantity: Decimal) -> Self {
        if let Ok(mut account) = self.account.lock() {
            account.holdings.insert(symbol.to_string(), quantity);
        }
        self
    }

    /// Price used for orders that carry no expected price.
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        if let Ok(mut account) = self.account.lock() {
            account.last_prices.insert(symbol.to_string(), price);
        }
    }

    /// Answer every submission with a non-success status until cleared.
    pub fn fail_orders(&self, status: u16, message: impl Into<String>) {
        if let Ok(mut account) = self.account.lock() {
            account.failure = Some((status, message.into()));
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut account) = self.account.lock() {
            account.failure = None;
        }
    }

    pub fn cash(&self) -> Decimal {
        self.account.lock().map(|a| a.cash).unwrap_or_default()
    }

    /// Held quantity, zero if none.
    pub fn holding(&self, symbol: &str) -> Decimal {
        self.account
            .lock()
            .ok()
            .and_then(|a| a.holdings.get(symbol).copied())
            .unwrap_or_default()
    }

    /// All fills so far, oldest first.
    pub fn fills(&self) -> Vec<OrderAck> {
        self.account.lock().map(|a| a.fills.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Account>, BrokerError> {
        self.account
            .lock()
            .map_err(|_| BrokerError::ApiError("paper account lock poisoned".into()))
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck, BrokerError> {
        let mut account = self.lock()?;

        if let Some((status, message)) = &account.failure {
            return Err(BrokerError::Submission {
                status: *status,
                message: message.clone(),
            });
        }
        if request.quantity <= Decimal::ZERO {
            return Err(BrokerError::Submission {
                status: 422,
                message: format!("qty must be > 0, got {}", request.quantity),
            });
        }

        let market_price = request
            .expected_price
            .or_else(|| account.last_prices.get(&request.symbol).copied())
            .ok_or_else(|| BrokerError::Submission {
                status: 422,
                message: format!("no price available for {}", request.symbol),
            })?;

        let fill_price = match request.side {
            Side::Buy => market_price * (Decimal::ONE + self.slippage),
            Side::Sell => market_price * (Decimal::ONE - self.slippage),
        };
        let commission = self.commission_per_share * request.quantity;
        let value = fill_price * request.quantity;

        match request.side {
            Side::Buy => {
                let required = value + commission;
                if required > account.cash {
                    return Err(BrokerError::InsufficientFunds {
                        required,
                        available: account.cash,
                    });
                }
                account.cash -= required;
                *account.holdings.entry(request.symbol.clone()).or_default() += request.quantity;
            }
            Side::Sell => {
                let held = account.holdings.get(&request.symbol).copied().unwrap_or_default();
                if request.quantity > held {
                    return Err(BrokerError::InsufficientPosition {
                        symbol: request.symbol.clone(),
                        requested: request.quantity,
                        held,
                    });
                }
                account.cash += value - commission;
                let remaining = held - request.quantity;
                if remaining.is_zero() {
                    account.holdings.remove(&request.symbol);
                } else {
                    account.holdings.insert(request.symbol.clone(), remaining);
                }
            }
        }

        let ack = OrderAck {
            order_id: Uuid::new_v4().to_string(),
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            filled_price: Some(fill_price),
            submitted_at: Utc::now(),
        };
        account.fills.push(ack.clone());

        debug!(
            symbol = %ack.symbol,
            side = %ack.side,
            quantity = %ack.quantity,
            price = %fill_price,
            "Paper fill"
        );
        Ok(ack)
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<Decimal>, BrokerError> {
        let account = self.lock()?;
        Ok(account.holdings.get(symbol).copied().filter(|q| !q.is_zero()))
    }

    fn name(&self) -> &str {
        "Paper Broker"
    }
}
