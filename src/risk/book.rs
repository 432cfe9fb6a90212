//! Order-book reader.

use tracing::warn;

use crate::api::{ExchangeGateway, RawBookTop};
use crate::models::OrderBookTop;

use super::RiskError;

/// Validate a raw book top. A side that is missing or non-positive counts
/// as empty.
pub fn to_book_top(symbol: &str, raw: RawBookTop) -> Result<OrderBookTop, RiskError> {
    let bid = raw
        .best_bid
        .filter(|p| p.is_sign_positive() && !p.is_zero())
        .ok_or_else(|| RiskError::EmptyBook {
            symbol: symbol.to_string(),
            side: "bid",
        })?;
    let ask = raw
        .best_ask
        .filter(|p| p.is_sign_positive() && !p.is_zero())
        .ok_or_else(|| RiskError::EmptyBook {
            symbol: symbol.to_string(),
            side: "ask",
        })?;

    let top = OrderBookTop::new(bid, ask);
    if top.is_crossed() {
        warn!(symbol = %symbol, bid = %bid, ask = %ask, "Crossed book, pricing off it anyway");
    }
    Ok(top)
}

pub async fn read_top_of_book(
    gateway: &dyn ExchangeGateway,
    symbol: &str,
) -> Result<OrderBookTop, RiskError> {
    let raw = gateway
        .fetch_order_book_top(symbol)
        .await
        .map_err(RiskError::gateway)?;
    to_book_top(symbol, raw)
}
