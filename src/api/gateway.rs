//! Exchange gateway port: the capability set the risk controller consumes.
//!
//! Implementations return raw, exchange-shaped records; normalization into
//! [`crate::models`] types happens in the risk module. Every call may fail
//! with a connectivity or protocol error, reported as `anyhow::Error`.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::OrderSide;

/// Position record as reported by the exchange.
///
/// `amount` may be signed (negative for shorts) or unsigned depending on the
/// exchange convention; `side` carries the exchange's own label when it
/// reports one (e.g. `LONG`, `SHORT`, `BOTH`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPosition {
    pub symbol: String,
    pub side: Option<String>,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub notional: Decimal,
    pub pnl_percent: Option<Decimal>,
    pub unrealized_pnl: Decimal,
}

/// Best quotes on each side of the book; `None` when that side is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawBookTop {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
}

/// Most recent public trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTrade {
    pub price: Decimal,
    pub qty: Decimal,
    pub time_ms: i64,
}

/// One of our orders, in exchange vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOrder {
    pub order_id: String,
    pub status: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub orig_qty: Decimal,
    pub executed_qty: Decimal,
    pub time_ms: i64,
}

/// Exchange operations used by the risk controller.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Current position for `symbol`, or `None` if the exchange reports none.
    async fn fetch_position(&self, symbol: &str) -> Result<Option<RawPosition>>;

    async fn fetch_order_book_top(&self, symbol: &str) -> Result<RawBookTop>;

    /// Last public trade, or `None` if there are no recent trades.
    async fn fetch_last_trade(&self, symbol: &str) -> Result<Option<RawTrade>>;

    /// Our recent orders for `symbol`, oldest first.
    async fn fetch_orders(&self, symbol: &str) -> Result<Vec<RawOrder>>;

    /// Cancel every resting order for `symbol`. Cancelling nothing is not an error.
    async fn cancel_all_orders(&self, symbol: &str) -> Result<()>;

    /// Submit a GTC limit order; returns the exchange order id.
    async fn submit_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
        size: Decimal,
    ) -> Result<String>;

    /// Round `price` to the instrument's price increment.
    async fn round_price(&self, symbol: &str, price: Decimal) -> Result<Decimal>;
}

/// Round `price` to the nearest multiple of `tick`, midpoint away from zero.
/// A non-positive tick leaves the price unchanged.
pub fn round_to_tick(price: Decimal, tick: Decimal) -> Decimal {
    if tick <= Decimal::ZERO {
        return price;
    }
    let steps = (price / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    steps * tick
}
