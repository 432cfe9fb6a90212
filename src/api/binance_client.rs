//! Binance USDT-M futures client implementing [`ExchangeGateway`].
//!
//! Handles:
//! - HMAC-SHA256 request signing for account endpoints
//! - Position, order-book, trade and order queries
//! - Limit order placement and bulk cancellation
//! - Price rounding to the symbol's tick size (loaded once, then cached)

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::OrderSide;

use super::gateway::{round_to_tick, ExchangeGateway, RawBookTop, RawOrder, RawPosition, RawTrade};
use super::types::*;

/// Production USDT-M futures endpoint.
pub const FUTURES_URL: &str = "https://fapi.binance.com";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RECV_WINDOW_MS: u64 = 5_000;

/// How many recent orders to pull when checking for a pending order.
const RECENT_ORDERS_LIMIT: u32 = 10;

/// REST client for Binance USDT-M futures.
pub struct BinanceFuturesClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
    tick_sizes: RwLock<HashMap<String, Decimal>>,
}

impl BinanceFuturesClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_key` - Binance API key (sent as `X-MBX-APIKEY`)
    /// * `api_secret` - Binance API secret (HMAC key)
    /// * `base_url` - REST root, e.g. [`FUTURES_URL`] or the testnet URL
    pub fn new(api_key: &str, api_secret: &str, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            recv_window_ms: DEFAULT_RECV_WINDOW_MS,
            tick_sizes: RwLock::new(HashMap::new()),
        })
    }

    /// HMAC-SHA256 of `query`, hex-encoded.
    fn sign(&self, query: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| anyhow!("Invalid API secret: {}", e))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn timestamp_ms() -> Result<u128> {
        Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis())
    }

    /// Send an unauthenticated GET to a market-data endpoint.
    async fn public_get<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        debug!(url = %url, "Binance public request");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", path))?;

        Self::parse_response(path, resp).await
    }

    /// Send a signed request to an account endpoint.
    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>();
        query.push(format!("recvWindow={}", self.recv_window_ms));
        query.push(format!("timestamp={}", Self::timestamp_ms()?));
        let query = query.join("&");
        let signature = self.sign(&query)?;

        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);
        debug!(method = %method, path = %path, "Binance signed request");

        let resp = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", path))?;

        Self::parse_response(path, resp).await
    }

    async fn parse_response<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(anyhow!("{} failed: {} (code {}): {}", path, status, err.code, err.msg));
            }
            return Err(anyhow!("{} failed: {} - {}", path, status, body));
        }

        serde_json::from_str(&body).with_context(|| format!("Failed to parse {} response", path))
    }

    /// Tick size for `symbol`, fetched from exchangeInfo on first use.
    async fn tick_size(&self, symbol: &str) -> Result<Decimal> {
        if let Some(tick) = self.tick_sizes.read().await.get(symbol) {
            return Ok(*tick);
        }

        let info: ExchangeInfoResponse = self
            .public_get("/fapi/v1/exchangeInfo", &format!("symbol={}", symbol))
            .await?;
        let tick = info
            .symbols
            .iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
            .and_then(SymbolInfo::tick_size)
            .ok_or_else(|| anyhow!("No PRICE_FILTER for {}", symbol))?;

        info!(symbol = %symbol, tick_size = %tick, "Loaded instrument precision");
        self.tick_sizes.write().await.insert(symbol.to_string(), tick);
        Ok(tick)
    }
}

#[async_trait]
impl ExchangeGateway for BinanceFuturesClient {
    async fn fetch_position(&self, symbol: &str) -> Result<Option<RawPosition>> {
        let positions: Vec<PositionRiskResponse> = self
            .signed_request(
                Method::GET,
                "/fapi/v2/positionRisk",
                &[("symbol", symbol.to_string())],
            )
            .await?;

        // Hedge mode reports one entry per side; prefer the one with exposure.
        let mut matching: Vec<PositionRiskResponse> = positions
            .into_iter()
            .filter(|p| p.symbol.eq_ignore_ascii_case(symbol))
            .collect();
        let index = matching
            .iter()
            .position(|p| !p.position_amt.is_zero())
            .unwrap_or(0);

        if matching.is_empty() {
            return Ok(None);
        }
        Ok(Some(matching.swap_remove(index).into_raw()))
    }

    async fn fetch_order_book_top(&self, symbol: &str) -> Result<RawBookTop> {
        let depth: DepthResponse = self
            .public_get("/fapi/v1/depth", &format!("symbol={}&limit=5", symbol))
            .await?;
        Ok(depth.top())
    }

    async fn fetch_last_trade(&self, symbol: &str) -> Result<Option<RawTrade>> {
        let trades: Vec<TradeResponse> = self
            .public_get("/fapi/v1/trades", &format!("symbol={}&limit=1", symbol))
            .await?;
        Ok(trades.into_iter().last().map(RawTrade::from))
    }

    async fn fetch_orders(&self, symbol: &str) -> Result<Vec<RawOrder>> {
        let orders: Vec<OrderResponse> = self
            .signed_request(
                Method::GET,
                "/fapi/v1/allOrders",
                &[
                    ("symbol", symbol.to_string()),
                    ("limit", RECENT_ORDERS_LIMIT.to_string()),
                ],
            )
            .await?;
        Ok(orders.into_iter().map(RawOrder::from).collect())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<()> {
        let _: serde_json::Value = self
            .signed_request(
                Method::DELETE,
                "/fapi/v1/allOpenOrders",
                &[("symbol", symbol.to_string())],
            )
            .await?;
        debug!(symbol = %symbol, "Cancelled all open orders");
        Ok(())
    }

    async fn submit_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
        size: Decimal,
    ) -> Result<String> {
        let client_order_id = format!("rg-{}", uuid::Uuid::new_v4().simple());
        let placed: PlacedOrderResponse = self
            .signed_request(
                Method::POST,
                "/fapi/v1/order",
                &[
                    ("symbol", symbol.to_string()),
                    ("side", side.as_str().to_string()),
                    ("type", "LIMIT".to_string()),
                    ("timeInForce", "GTC".to_string()),
                    ("quantity", size.normalize().to_string()),
                    ("price", price.normalize().to_string()),
                    ("newClientOrderId", client_order_id),
                ],
            )
            .await?;

        if matches!(placed.status.as_str(), "REJECTED" | "EXPIRED") {
            return Err(anyhow!("Order {} came back {}", placed.order_id, placed.status));
        }
        Ok(placed.order_id.to_string())
    }

    async fn round_price(&self, symbol: &str, price: Decimal) -> Result<Decimal> {
        let tick = self.tick_size(symbol).await?;
        Ok(round_to_tick(price, tick))
    }
}
