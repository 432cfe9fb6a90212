//! Position snapshot reader: raw gateway position -> [`PositionSnapshot`].

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::api::{ExchangeGateway, RawPosition};
use crate::models::{PositionSide, PositionSnapshot};

use super::RiskError;

/// Normalize a raw position record.
///
/// - No record, or a zero amount, yields the canonical FLAT snapshot.
/// - Side comes from an explicit `LONG` / `SHORT` label when the exchange
///   gives one (hedge mode), otherwise from the sign of `amount`.
/// - Size is always the magnitude of `amount`.
pub fn normalize(symbol: &str, raw: Option<RawPosition>) -> PositionSnapshot {
    let Some(raw) = raw else {
        return PositionSnapshot::flat(symbol);
    };
    if raw.amount.is_zero() {
        return PositionSnapshot::flat(symbol);
    }

    let labelled = raw
        .side
        .as_deref()
        .and_then(|label| label.parse::<PositionSide>().ok())
        .filter(|side| *side != PositionSide::Flat);

    let side = labelled.unwrap_or(if raw.amount.is_sign_negative() {
        PositionSide::Short
    } else {
        PositionSide::Long
    });

    let pnl_pct = raw.pnl_percent.unwrap_or_else(|| {
        warn!(symbol = %symbol, "Exchange reported no PnL percent, using 0");
        Decimal::ZERO
    });

    PositionSnapshot::open(
        symbol,
        side,
        raw.amount,
        raw.entry_price,
        raw.notional,
        pnl_pct,
        raw.unrealized_pnl,
    )
}

/// Fetch and normalize the current position. No retry here.
pub async fn read_snapshot(
    gateway: &dyn ExchangeGateway,
    symbol: &str,
) -> Result<PositionSnapshot, RiskError> {
    let raw = gateway
        .fetch_position(symbol)
        .await
        .map_err(RiskError::gateway)?;
    let snapshot = normalize(symbol, raw);
    debug!(snapshot = %snapshot, "Read position");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::scripted::{long_position, short_position, ScriptedGateway};
    use rust_decimal_macros::dec;

    #[test]
    fn test_missing_position_is_flat() {
        let snap = normalize("BTCUSDT", None);
        assert!(snap.is_flat());
        assert_eq!(snap.size(), Decimal::ZERO);
        assert_eq!(snap.symbol(), "BTCUSDT");
    }

    #[test]
    fn test_zero_amount_is_flat() {
        let snap = normalize("BTCUSDT", Some(long_position("BTCUSDT", Decimal::ZERO, dec!(3))));
        assert!(snap.is_flat());
        assert_eq!(snap.unrealized_pnl_pct(), Decimal::ZERO);
    }

    #[test]
    fn test_negative_short_amount() {
        let snap = normalize("BTCUSDT", Some(short_position("BTCUSDT", dec!(0.004), dec!(-1.5))));
        assert_eq!(snap.side(), PositionSide::Short);
        assert_eq!(snap.size(), dec!(0.004));
        assert!(snap.size() >= Decimal::ZERO);
        assert_eq!(snap.unrealized_pnl_pct(), dec!(-1.5));
    }

    #[test]
    fn test_hedge_mode_label_wins_over_sign() {
        // Some venues report shorts with a positive amount and a SHORT label.
        let mut raw = long_position("BTCUSDT", dec!(0.002), dec!(2));
        raw.side = Some("SHORT".to_string());

        let snap = normalize("BTCUSDT", Some(raw));
        assert_eq!(snap.side(), PositionSide::Short);
        assert_eq!(snap.size(), dec!(0.002));
    }

    #[test]
    fn test_missing_pnl_defaults_to_zero() {
        let mut raw = long_position("BTCUSDT", dec!(0.002), dec!(2));
        raw.pnl_percent = None;

        let snap = normalize("BTCUSDT", Some(raw));
        assert_eq!(snap.side(), PositionSide::Long);
        assert_eq!(snap.unrealized_pnl_pct(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_read_maps_gateway_failure() {
        let gateway = ScriptedGateway::new("BTCUSDT").with_position_error("503 Service Unavailable");

        let err = read_snapshot(&gateway, "BTCUSDT").await.unwrap_err();
        assert!(matches!(err, RiskError::GatewayUnavailable(_)));
        assert!(err.is_retryable());
    }
}
