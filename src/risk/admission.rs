//! Admission control: may a new position be opened?

use std::fmt;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::api::{ExchangeGateway, RawOrder};
use crate::models::{OrderState, PositionSide, PositionSnapshot};

use super::{snapshot::read_snapshot, RiskError};

/// Why an entry was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    MaxExposure { size: Decimal, max: Decimal },
    OppositeSide { current: PositionSide, expected: PositionSide },
    PendingOrder { order_id: String },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::MaxExposure { size, max } => {
                write!(f, "position size {} is at or above max {}", size, max)
            }
            DenialReason::OppositeSide { current, expected } => {
                write!(f, "holding {} while a {} entry was requested", current, expected)
            }
            DenialReason::PendingOrder { order_id } => {
                write!(f, "last order {} is still open", order_id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied(DenialReason),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Admission::Allowed => f.write_str("allowed"),
            Admission::Denied(reason) => write!(f, "denied: {}", reason),
        }
    }
}

/// Checks that only need the position, in order: size cap, then side.
pub fn check_position(
    snapshot: &PositionSnapshot,
    expected_side: PositionSide,
    max_size: Decimal,
) -> Option<DenialReason> {
    if snapshot.size() >= max_size {
        return Some(DenialReason::MaxExposure {
            size: snapshot.size(),
            max: max_size,
        });
    }
    if snapshot.side().opposes(expected_side) {
        return Some(DenialReason::OppositeSide {
            current: snapshot.side(),
            expected: expected_side,
        });
    }
    None
}

/// The most recently placed order, if it is still working.
pub fn pending_order(orders: &[RawOrder]) -> Option<DenialReason> {
    let latest = orders.iter().max_by_key(|o| o.time_ms)?;
    OrderState::from_exchange(&latest.status)
        .is_open()
        .then(|| DenialReason::PendingOrder {
            order_id: latest.order_id.clone(),
        })
}

/// Read-only admission check against live exchange state.
///
/// Orders are only fetched when the position checks pass.
pub async fn evaluate_admission(
    gateway: &dyn ExchangeGateway,
    symbol: &str,
    expected_side: PositionSide,
    max_size: Decimal,
) -> Result<Admission, RiskError> {
    let snapshot = read_snapshot(gateway, symbol).await?;

    let denial = match check_position(&snapshot, expected_side, max_size) {
        Some(reason) => Some(reason),
        None => {
            let orders = gateway
                .fetch_orders(symbol)
                .await
                .map_err(RiskError::gateway)?;
            if let Some(latest) = orders.iter().max_by_key(|o| o.time_ms) {
                debug!(
                    symbol = %symbol,
                    order_id = %latest.order_id,
                    status = %latest.status,
                    side = %latest.side,
                    price = %latest.price,
                    filled = %latest.executed_qty,
                    qty = %latest.orig_qty,
                    "Latest order"
                );
            }
            pending_order(&orders)
        }
    };

    Ok(match denial {
        Some(reason) => {
            info!(symbol = %symbol, expected = %expected_side, reason = %reason, "Entry denied");
            Admission::Denied(reason)
        }
        None => Admission::Allowed,
    })
}
