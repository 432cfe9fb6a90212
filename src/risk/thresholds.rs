//! PnL threshold evaluator.

use std::fmt;

use crate::models::PositionSnapshot;

use super::RiskPolicy;

/// What the threshold check asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdAction {
    None,
    CloseStopLoss,
    CloseTakeProfit,
}

impl ThresholdAction {
    pub fn is_close(&self) -> bool {
        !matches!(self, ThresholdAction::None)
    }
}

impl fmt::Display for ThresholdAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThresholdAction::None => "none",
            ThresholdAction::CloseStopLoss => "stop-loss",
            ThresholdAction::CloseTakeProfit => "take-profit",
        };
        f.write_str(s)
    }
}

/// Compare the snapshot's PnL % against the policy.
///
/// Stop-loss (strictly below) is checked before take-profit (at or above),
/// so it wins even under a misconfigured policy where both hold.
pub fn evaluate(snapshot: &PositionSnapshot, policy: &RiskPolicy) -> ThresholdAction {
    if snapshot.is_flat() {
        return ThresholdAction::None;
    }

    let pnl = snapshot.unrealized_pnl_pct();
    if pnl < policy.stop_loss_pct {
        ThresholdAction::CloseStopLoss
    } else if pnl >= policy.take_profit_pct {
        ThresholdAction::CloseTakeProfit
    } else {
        ThresholdAction::None
    }
}
