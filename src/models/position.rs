//! Position snapshot: a point-in-time view of our exposure on one symbol.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::OrderSide;

/// Direction of the current exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Flat => "flat",
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }

    /// True when `self` and `other` are exposures in opposite directions.
    /// FLAT opposes nothing.
    pub fn opposes(&self, other: PositionSide) -> bool {
        matches!(
            (self, other),
            (PositionSide::Long, PositionSide::Short) | (PositionSide::Short, PositionSide::Long)
        )
    }

    /// Order side that adds to a position in this direction.
    pub fn entry_order_side(&self) -> Option<OrderSide> {
        match self {
            PositionSide::Long => Some(OrderSide::Buy),
            PositionSide::Short => Some(OrderSide::Sell),
            PositionSide::Flat => None,
        }
    }

    /// Order side that reduces a position in this direction.
    pub fn exit_order_side(&self) -> Option<OrderSide> {
        self.entry_order_side().map(|side| side.opposite())
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" | "both" | "" => Ok(PositionSide::Flat),
            "long" => Ok(PositionSide::Long),
            "short" => Ok(PositionSide::Short),
            other => Err(format!("unknown position side: {other}")),
        }
    }
}

/// Normalized, immutable view of a symbol's position.
///
/// `side == Flat` if and only if `size == 0`. A fresh snapshot is read on
/// every evaluation; nothing holds on to an old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSnapshot {
    symbol: String,
    side: PositionSide,
    size: Decimal,
    entry_price: Decimal,
    notional: Decimal,
    unrealized_pnl_pct: Decimal,
    unrealized_pnl: Decimal,
}

impl PositionSnapshot {
    /// Canonical snapshot for a symbol with no exposure.
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            side: PositionSide::Flat,
            size: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            notional: Decimal::ZERO,
            unrealized_pnl_pct: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
        }
    }

    /// Build a snapshot for an open position.
    ///
    /// The magnitude of `size` is taken, so short sizes may be passed signed.
    /// A zero size or a FLAT side collapses to [`PositionSnapshot::flat`].
    pub fn open(
        symbol: impl Into<String>,
        side: PositionSide,
        size: Decimal,
        entry_price: Decimal,
        notional: Decimal,
        unrealized_pnl_pct: Decimal,
        unrealized_pnl: Decimal,
    ) -> Self {
        let size = size.abs();
        if size.is_zero() || side == PositionSide::Flat {
            return Self::flat(symbol);
        }

        Self {
            symbol: symbol.into(),
            side,
            size,
            entry_price,
            notional,
            unrealized_pnl_pct,
            unrealized_pnl,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    /// Non-negative exposure magnitude.
    pub fn size(&self) -> Decimal {
        self.size
    }

    /// Average entry price. Zero when flat.
    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    /// Informational only; sign follows the exchange convention.
    pub fn notional(&self) -> Decimal {
        self.notional
    }

    /// Signed percentage return. Zero when flat.
    pub fn unrealized_pnl_pct(&self) -> Decimal {
        self.unrealized_pnl_pct
    }

    /// Signed PnL in quote currency. Zero when flat.
    pub fn unrealized_pnl(&self) -> Decimal {
        self.unrealized_pnl
    }

    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::Flat
    }
}

impl fmt::Display for PositionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_flat() {
            return write!(f, "{} FLAT", self.symbol);
        }
        write!(
            f,
            "{} {} {} @ {} (PnL {} / {}%)",
            self.symbol,
            self.side.as_str().to_uppercase(),
            self.size,
            self.entry_price,
            self.unrealized_pnl.round_dp(2),
            self.unrealized_pnl_pct.round_dp(2),
        )
    }
}
