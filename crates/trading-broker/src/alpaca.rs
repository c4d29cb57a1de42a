//! Alpaca REST integration: bars, latest quotes, market orders and positions.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use trading_core::error::{BrokerError, DataError};
use trading_core::traits::{Broker, MarketData, Quote, QuoteSource};
use trading_core::types::{Bar, OrderAck, OrderRequest, Side, Timeframe};

/// Alpaca API configuration.
#[derive(Debug, Clone)]
pub struct AlpacaConfig {
    pub api_key: String,
    pub api_secret: String,
    pub paper: bool,
    /// Market data feed ("iex" or "sip")
    pub feed: String,
}

impl AlpacaConfig {
    /// Create config directly with key and secret.
    pub fn new(api_key: String, api_secret: String, paper: bool) -> Self {
        Self {
            api_key,
            api_secret,
            paper,
            feed: "iex".to_string(),
        }
    }

    /// Load credentials from the named environment variables.
    pub fn from_env_vars(
        key_var: &str,
        secret_var: &str,
        paper: bool,
    ) -> Result<Self, BrokerError> {
        let api_key = std::env::var(key_var)
            .map_err(|_| BrokerError::Configuration(format!("{key_var} not set")))?;
        let api_secret = std::env::var(secret_var)
            .map_err(|_| BrokerError::Configuration(format!("{secret_var} not set")))?;
        Ok(Self::new(api_key, api_secret, paper))
    }

    pub fn base_url(&self) -> &str {
        if self.paper {
            "https://paper-api.alpaca.markets"
        } else {
            "https://api.alpaca.markets"
        }
    }

    pub fn data_url(&self) -> &str {
        "https://data.alpaca.markets"
    }
}

#[derive(Debug, Deserialize)]
struct AlpacaPosition {
    qty: String,
}

#[derive(Debug, Deserialize)]
struct AlpacaOrder {
    id: String,
    symbol: String,
    qty: Option<String>,
    side: String,
    filled_avg_price: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest {
    symbol: String,
    qty: String,
    side: &'static str,
    #[serde(rename = "type")]
    order_type: &'static str,
    time_in_force: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    t: DateTime<Utc>,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct AlpacaBarsResponse {
    #[serde(default)]
    bars: Option<Vec<AlpacaBar>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlpacaQuote {
    ap: f64,
    bp: f64,
    t: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct AlpacaLatestQuoteResponse {
    quote: Option<AlpacaQuote>,
}

/// Alpaca broker and market data client.
pub struct AlpacaBroker {
    config: AlpacaConfig,
    client: Client,
}

impl AlpacaBroker {
    /// Create a new Alpaca client.
    pub fn new(config: AlpacaConfig) -> Result<Self, BrokerError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            header::HeaderValue::from_str(&config.api_key)
                .map_err(|e| BrokerError::Configuration(e.to_string()))?,
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            header::HeaderValue::from_str(&config.api_secret)
                .map_err(|e| BrokerError::Configuration(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }
}

/// Alpaca's name for a bar interval.
fn timeframe_param(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::Minute1 => "1Min",
        Timeframe::Minute5 => "5Min",
        Timeframe::Minute15 => "15Min",
        Timeframe::Minute30 => "30Min",
        Timeframe::Hour1 => "1Hour",
        Timeframe::Daily => "1Day",
    }
}

fn side_param(side: Side) -> &'static str {
    match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

fn order_body(request: &OrderRequest) -> CreateOrderRequest {
    CreateOrderRequest {
        symbol: request.symbol.clone(),
        qty: request.quantity.to_string(),
        side: side_param(request.side),
        order_type: "market",
        time_in_force: "day",
        client_order_id: request.client_order_id.clone(),
    }
}

fn parse_order(order: AlpacaOrder, request: &OrderRequest) -> Result<OrderAck, BrokerError> {
    let side = match order.side.as_str() {
        "buy" => Side::Buy,
        "sell" => Side::Sell,
        _ => return Err(BrokerError::ApiError(format!("Unknown side: {}", order.side))),
    };
    let quantity = order
        .qty
        .as_deref()
        .and_then(|q| q.parse::<Decimal>().ok())
        .unwrap_or(request.quantity);

    Ok(OrderAck {
        order_id: order.id,
        symbol: order.symbol,
        side,
        quantity,
        filled_price: order.filled_avg_price.as_deref().and_then(|p| p.parse().ok()),
        submitted_at: order.submitted_at.unwrap_or_else(Utc::now),
    })
}

fn to_bar(bar: &AlpacaBar) -> Bar {
    Bar::new(bar.t.timestamp_millis(), bar.o, bar.h, bar.l, bar.c, bar.v)
}

fn to_quote(symbol: &str, response: AlpacaLatestQuoteResponse) -> Option<Quote> {
    let quote = response.quote?;
    let quote = Quote {
        symbol: symbol.to_string(),
        bid: quote.bp,
        ask: quote.ap,
        timestamp: quote.t.timestamp_millis(),
    };
    quote.is_usable().then_some(quote)
}

async fn error_text(resp: Response) -> (StatusCode, String) {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    (status, text)
}

#[async_trait]
impl Broker for AlpacaBroker {
    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck, BrokerError> {
        let url = format!("{}/v2/orders", self.config.base_url());
        let body = order_body(&request);

        debug!("Submitting order: {:?}", body);

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let (status, message) = error_text(resp).await;
            return Err(BrokerError::Submission {
                status: status.as_u16(),
                message,
            });
        }

        let order: AlpacaOrder = resp
            .json()
            .await
            .map_err(|e| BrokerError::ApiError(e.to_string()))?;

        info!("Order submitted: {} {} {}", order.side, request.quantity, order.symbol);
        parse_order(order, &request)
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<Decimal>, BrokerError> {
        let url = format!("{}/v2/positions/{}", self.config.base_url(), symbol);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let (status, text) = error_text(resp).await;
            return Err(BrokerError::ApiError(format!("{}: {}", status, text)));
        }

        let position: AlpacaPosition = resp
            .json()
            .await
            .map_err(|e| BrokerError::ApiError(e.to_string()))?;
        let quantity: Decimal = position
            .qty
            .parse()
            .map_err(|_| BrokerError::ApiError(format!("Invalid position qty: {}", position.qty)))?;

        Ok((!quantity.is_zero()).then_some(quantity))
    }

    fn name(&self) -> &str {
        if self.config.paper {
            "Alpaca Paper"
        } else {
            "Alpaca Live"
        }
    }
}

#[async_trait]
impl MarketData for AlpacaBroker {
    async fn get_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, DataError> {
        let url = format!("{}/v2/stocks/{}/bars", self.config.data_url(), symbol);
        let mut bars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("timeframe", timeframe_param(timeframe).to_string()),
                ("start", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("end", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("feed", self.config.feed.clone()),
                ("adjustment", "raw".to_string()),
                ("limit", "10000".to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("page_token", token.clone()));
            }

            let resp = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .map_err(|e| DataError::ConnectionError(e.to_string()))?;

            if !resp.status().is_success() {
                let (status, text) = error_text(resp).await;
                return Err(DataError::ConnectionError(format!("{}: {}", status, text)));
            }

            let page: AlpacaBarsResponse = resp
                .json()
                .await
                .map_err(|e| DataError::ParseError(e.to_string()))?;
            bars.extend(page.bars.iter().flatten().map(to_bar));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        if bars.is_empty() {
            return Err(DataError::Unavailable {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn name(&self) -> &str {
        "Alpaca"
    }
}

#[async_trait]
impl QuoteSource for AlpacaBroker {
    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>, DataError> {
        let url = format!("{}/v2/stocks/{}/quotes/latest", self.config.data_url(), symbol);
        let resp = self
            .client
            .get(&url)
            .query(&[("feed", self.config.feed.as_str())])
            .send()
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let (status, text) = error_text(resp).await;
            return Err(DataError::ConnectionError(format!("{}: {}", status, text)));
        }

        let data: AlpacaLatestQuoteResponse = resp
            .json()
            .await
            .map_err(|e| DataError::ParseError(e.to_string()))?;
        Ok(to_quote(symbol, data))
    }

    fn name(&self) -> &str {
        "Alpaca"
    }
}
