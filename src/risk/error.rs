//! Error taxonomy for the risk controller.

use thiserror::Error;

use crate::models::OrderSide;

#[derive(Debug, Error)]
pub enum RiskError {
    /// Transient connectivity or API failure.
    #[error("exchange gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// No resting order on one side of the book.
    #[error("order book for {symbol} has no {side} quotes")]
    EmptyBook { symbol: String, side: &'static str },

    /// The exchange refused a submitted order.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("invalid risk policy: {0}")]
    InvalidPolicy(String),
}

impl RiskError {
    pub(crate) fn gateway(err: anyhow::Error) -> Self {
        RiskError::GatewayUnavailable(format!("{:#}", err))
    }

    pub(crate) fn rejected(side: OrderSide, err: anyhow::Error) -> Self {
        RiskError::OrderRejected(format!("{} order: {:#}", side, err))
    }

    /// Only connectivity failures are worth retrying; an empty book is
    /// skipped for the current tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RiskError::GatewayUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(RiskError::GatewayUnavailable("timeout".into()).is_retryable());
        assert!(!RiskError::EmptyBook {
            symbol: "BTCUSDT".into(),
            side: "ask"
        }
        .is_retryable());
        assert!(!RiskError::OrderRejected("margin".into()).is_retryable());
    }

    #[test]
    fn test_gateway_error_keeps_context_chain() {
        let err = anyhow::anyhow!("connection reset").context("/fapi/v2/positionRisk failed");
        let msg = RiskError::gateway(err).to_string();
        assert!(msg.contains("positionRisk"));
        assert!(msg.contains("connection reset"));
    }
}
