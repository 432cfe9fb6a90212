//! Risk policy configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::RiskError;

/// Immutable thresholds and cadence the controller enforces.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskPolicy {
    /// Close when unrealized PnL % drops strictly below this (negative)
    pub stop_loss_pct: Decimal,

    /// Close when unrealized PnL % reaches this (positive)
    pub take_profit_pct: Decimal,

    /// No new entries once position size reaches this
    pub max_exposure_size: Decimal,

    /// Close-loop wait between submitting an order and re-reading the position
    pub order_poll_interval: Duration,

    /// Give up on a close after this long. `None` keeps trying until flat.
    pub close_timeout: Option<Duration>,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            stop_loss_pct: dec!(-4),
            take_profit_pct: dec!(8),
            max_exposure_size: dec!(0.004),
            order_poll_interval: Duration::from_secs(20),
            close_timeout: None,
        }
    }
}

impl RiskPolicy {
    /// Check signs and ranges. Stop-loss vs take-profit ordering is not
    /// enforced beyond their signs.
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.stop_loss_pct >= Decimal::ZERO {
            return Err(RiskError::InvalidPolicy(format!(
                "stop-loss must be negative, got {}",
                self.stop_loss_pct
            )));
        }
        if self.take_profit_pct <= Decimal::ZERO {
            return Err(RiskError::InvalidPolicy(format!(
                "take-profit must be positive, got {}",
                self.take_profit_pct
            )));
        }
        if self.max_exposure_size <= Decimal::ZERO {
            return Err(RiskError::InvalidPolicy(format!(
                "max exposure must be positive, got {}",
                self.max_exposure_size
            )));
        }
        if self.order_poll_interval.is_zero() {
            return Err(RiskError::InvalidPolicy(
                "order poll interval must be positive".to_string(),
            ));
        }
        if self.close_timeout.is_some_and(|t| t.is_zero()) {
            return Err(RiskError::InvalidPolicy(
                "close timeout must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_policy_is_valid() {
        let policy = RiskPolicy::default();
        assert_ok!(policy.validate());
        assert_eq!(policy.stop_loss_pct, dec!(-4));
        assert_eq!(policy.take_profit_pct, dec!(8));
        assert_eq!(policy.order_poll_interval, Duration::from_secs(20));
        assert!(policy.close_timeout.is_none());
    }

    #[test]
    fn test_rejects_bad_signs() {
        let policy = RiskPolicy {
            stop_loss_pct: dec!(4),
            ..Default::default()
        };
        assert!(matches!(policy.validate(), Err(RiskError::InvalidPolicy(_))));

        let policy = RiskPolicy {
            take_profit_pct: Decimal::ZERO,
            ..Default::default()
        };
        assert_err!(policy.validate());

        let policy = RiskPolicy {
            max_exposure_size: dec!(-0.001),
            ..Default::default()
        };
        assert_err!(policy.validate());
    }

    #[test]
    fn test_rejects_zero_durations() {
        let policy = RiskPolicy {
            order_poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_err!(policy.validate());

        let policy = RiskPolicy {
            close_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_err!(policy.validate());

        let policy = RiskPolicy {
            close_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        assert_ok!(policy.validate());
    }
}
