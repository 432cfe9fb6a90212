//! Order-side value types: order direction, top of book, order lifecycle.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best bid and best ask currently resting on the book.
///
/// Normally `best_bid < best_ask`. A crossed or locked book is carried as-is;
/// callers still price off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBookTop {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

impl OrderBookTop {
    pub fn new(best_bid: Decimal, best_ask: Decimal) -> Self {
        Self { best_bid, best_ask }
    }

    /// `best_bid >= best_ask`.
    pub fn is_crossed(&self) -> bool {
        self.best_bid >= self.best_ask
    }

    pub fn spread(&self) -> Decimal {
        self.best_ask - self.best_bid
    }
}

/// Lifecycle state of an order as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    /// Resting and unfilled, or partially filled and still working.
    Open,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderState {
    /// Map an exchange status string (Binance vocabulary) to a state.
    /// Unknown statuses are treated as terminal `Expired`.
    pub fn from_exchange(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "NEW" | "PARTIALLY_FILLED" | "OPEN" => OrderState::Open,
            "FILLED" => OrderState::Filled,
            "CANCELED" | "CANCELLED" | "PENDING_CANCEL" => OrderState::Canceled,
            "REJECTED" => OrderState::Rejected,
            _ => OrderState::Expired,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, OrderState::Open)
    }
}

/// The closing order planned in one close-loop cycle. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseAttempt {
    pub side: OrderSide,
    pub size: Decimal,
    pub price: Decimal,
}
