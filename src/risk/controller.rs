//! Risk controller: owns the policy and drives the gateway and notifier.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::ExchangeGateway;
use crate::models::{OrderBookTop, PositionSide, PositionSnapshot};
use crate::notify::{messages, Notifier};

use super::admission::{evaluate_admission, Admission};
use super::book::read_top_of_book;
use super::close_loop::{CloseLoop, CloseOutcome};
use super::snapshot::read_snapshot;
use super::thresholds::{self, ThresholdAction};
use super::{RiskError, RiskPolicy};

/// Result of one threshold evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Position as read before any action was taken.
    pub snapshot: PositionSnapshot,
    pub action: ThresholdAction,
    /// Set when the action triggered a close loop.
    pub outcome: Option<CloseOutcome>,
}

/// One-shot view of the symbol for operators.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub snapshot: PositionSnapshot,
    pub book: Option<OrderBookTop>,
    pub last_trade: Option<Decimal>,
    pub long_entry: Option<Admission>,
    pub short_entry: Option<Admission>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_unknown<T: fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unavailable".to_string())
        }

        writeln!(f, "Position:    {}", self.snapshot)?;
        if !self.snapshot.is_flat() {
            writeln!(f, "Notional:    {}", self.snapshot.notional())?;
        }
        match &self.book {
            Some(book) => writeln!(
                f,
                "Book:        {} / {} (spread {})",
                book.best_bid,
                book.best_ask,
                book.spread()
            )?,
            None => writeln!(f, "Book:        unavailable")?,
        }
        writeln!(f, "Last trade:  {}", or_unknown(&self.last_trade))?;
        writeln!(f, "Long entry:  {}", or_unknown(&self.long_entry))?;
        write!(f, "Short entry: {}", or_unknown(&self.short_entry))
    }
}

pub struct RiskController {
    symbol: String,
    policy: RiskPolicy,
    gateway: Arc<dyn ExchangeGateway>,
    notifier: Arc<dyn Notifier>,
    interrupt: Option<Arc<AtomicBool>>,
    pending_notifications: Mutex<Vec<JoinHandle<()>>>,
}

impl RiskController {
    pub fn new(
        symbol: impl Into<String>,
        policy: RiskPolicy,
        gateway: Arc<dyn ExchangeGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, RiskError> {
        policy.validate()?;
        Ok(Self {
            symbol: symbol.into(),
            policy,
            gateway,
            notifier,
            interrupt: None,
            pending_notifications: Mutex::new(Vec::new()),
        })
    }

    /// Let the close loop stop early once `flag` is set.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    pub async fn snapshot(&self) -> Result<PositionSnapshot, RiskError> {
        read_snapshot(self.gateway.as_ref(), &self.symbol).await
    }

    pub async fn top_of_book(&self) -> Result<OrderBookTop, RiskError> {
        read_top_of_book(self.gateway.as_ref(), &self.symbol).await
    }

    /// Check PnL thresholds and, on a breach, flatten before notifying.
    pub async fn evaluate(&self) -> Result<Evaluation, RiskError> {
        let snapshot = self.snapshot().await?;
        let action = thresholds::evaluate(&snapshot, &self.policy);

        if !action.is_close() {
            debug!(
                symbol = %self.symbol,
                side = %snapshot.side(),
                pnl_pct = %snapshot.unrealized_pnl_pct(),
                "Within thresholds"
            );
            return Ok(Evaluation {
                snapshot,
                action,
                outcome: None,
            });
        }

        warn!(
            symbol = %self.symbol,
            trigger = %action,
            side = %snapshot.side(),
            size = %snapshot.size(),
            pnl_pct = %snapshot.unrealized_pnl_pct().round_dp(2),
            "Threshold breached, closing position"
        );

        let outcome = self.flatten().await;
        if outcome.is_closed() {
            if let Some(text) = messages::position_closed(action, &snapshot) {
                self.notify(&text);
            }
        } else {
            error!(symbol = %self.symbol, trigger = %action, outcome = %outcome, "Close not confirmed");
        }

        Ok(Evaluation {
            snapshot,
            action,
            outcome: Some(outcome),
        })
    }

    /// Run the close loop until flat, or until an enabled escape hatch fires.
    pub async fn flatten(&self) -> CloseOutcome {
        CloseLoop::new(
            self.gateway.as_ref(),
            &self.symbol,
            self.policy.order_poll_interval,
        )
        .with_max_duration(self.policy.close_timeout)
        .with_interrupt(self.interrupt.as_deref())
        .run()
        .await
    }

    /// Operator flatten: like [`flatten`](Self::flatten), plus a notification
    /// when an open position was actually closed.
    ///
    /// A failed pre-read does not stop the close; it only means no message.
    pub async fn force_flatten(&self) -> CloseOutcome {
        let before = match self.snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "Position read failed, flattening anyway");
                None
            }
        };

        let outcome = self.flatten().await;
        match before {
            Some(before) if outcome.is_closed() && !before.is_flat() => {
                self.notify(&messages::position_flattened(&before, &outcome));
            }
            None if outcome.is_closed() => {
                info!(symbol = %self.symbol, "Flattened, size unknown so no notification sent");
            }
            _ => {}
        }
        outcome
    }

    /// Per-tick housekeeping: clear resting orders, then check thresholds.
    /// Errors are logged, never returned.
    pub async fn manage_position(&self) -> Option<Evaluation> {
        if let Err(e) = self.gateway.cancel_all_orders(&self.symbol).await {
            warn!(symbol = %self.symbol, error = %e, "Failed to cancel resting orders");
        }

        match self.evaluate().await {
            Ok(evaluation) => Some(evaluation),
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "Position check failed");
                None
            }
        }
    }

    pub async fn check_admission(
        &self,
        expected_side: PositionSide,
        max_size: Decimal,
    ) -> Result<Admission, RiskError> {
        evaluate_admission(self.gateway.as_ref(), &self.symbol, expected_side, max_size).await
    }

    /// Whether a new `expected_side` entry is allowed. Read-only.
    pub async fn can_open(
        &self,
        expected_side: PositionSide,
        max_size: Decimal,
    ) -> Result<bool, RiskError> {
        Ok(self
            .check_admission(expected_side, max_size)
            .await?
            .is_allowed())
    }

    /// Place an entry order: a long bids at the best bid, a short offers at
    /// the best ask. Admission is the caller's job. No retry on failure.
    pub async fn open(&self, side: PositionSide, size: Decimal) -> Result<String, RiskError> {
        let order_side = side
            .entry_order_side()
            .ok_or_else(|| RiskError::OrderRejected("cannot open a flat position".to_string()))?;
        if size <= Decimal::ZERO {
            return Err(RiskError::OrderRejected(format!(
                "order size must be positive, got {}",
                size
            )));
        }

        let book = self.top_of_book().await?;
        let quote = match side {
            PositionSide::Long => book.best_bid,
            _ => book.best_ask,
        };
        let price = self
            .gateway
            .round_price(&self.symbol, quote)
            .await
            .map_err(RiskError::gateway)?;

        info!(
            symbol = %self.symbol,
            side = %side,
            size = %size,
            price = %price,
            "Opening position"
        );

        let order_id = self
            .gateway
            .submit_limit_order(&self.symbol, order_side, price, size)
            .await
            .map_err(|e| RiskError::rejected(order_side, e))?;

        info!(symbol = %self.symbol, order_id = %order_id, "Entry order placed");
        self.notify(&messages::position_opened(
            &self.symbol,
            side,
            size,
            price,
            &self.policy,
        ));

        Ok(order_id)
    }

    /// Last traded price rounded to the instrument's tick.
    pub async fn last_trade_price(&self) -> Result<Option<Decimal>, RiskError> {
        let trade = self
            .gateway
            .fetch_last_trade(&self.symbol)
            .await
            .map_err(RiskError::gateway)?;
        let Some(trade) = trade else {
            return Ok(None);
        };
        debug!(
            symbol = %self.symbol,
            price = %trade.price,
            qty = %trade.qty,
            time_ms = trade.time_ms,
            "Last trade"
        );

        let price = self
            .gateway
            .round_price(&self.symbol, trade.price)
            .await
            .map_err(RiskError::gateway)?;
        Ok(Some(price))
    }

    /// Only the position read is required; other sections degrade to
    /// "unavailable".
    pub async fn status(&self) -> Result<StatusReport, RiskError> {
        let snapshot = self.snapshot().await?;
        let max = self.policy.max_exposure_size;

        let book = self.top_of_book().await.map_err(|e| self.note("order book", e)).ok();
        let last_trade = self
            .last_trade_price()
            .await
            .map_err(|e| self.note("last trade", e))
            .ok()
            .flatten();
        let long_entry = self
            .check_admission(PositionSide::Long, max)
            .await
            .map_err(|e| self.note("long admission", e))
            .ok();
        let short_entry = self
            .check_admission(PositionSide::Short, max)
            .await
            .map_err(|e| self.note("short admission", e))
            .ok();

        Ok(StatusReport {
            snapshot,
            book,
            last_trade,
            long_entry,
            short_entry,
        })
    }

    fn note(&self, what: &str, err: RiskError) -> RiskError {
        warn!(symbol = %self.symbol, error = %err, "Status: {} unavailable", what);
        err
    }

    /// Wait for notifications still in flight. One-shot commands call this
    /// before exiting so a queued message is not dropped with the runtime.
    pub async fn flush_notifications(&self) {
        let pending = std::mem::take(&mut *self.lock_pending());
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(symbol = %self.symbol, error = %e, "Notification task failed");
            }
        }
    }

    /// Delivery runs on its own task; a slow chat backend never holds up a
    /// close or the next tick.
    fn notify(&self, text: &str) {
        let notifier = self.notifier.clone();
        let symbol = self.symbol.clone();
        let text = text.to_string();
        let handle = tokio::spawn(async move {
            if let Err(e) = notifier.send(&text).await {
                warn!(symbol = %symbol, error = %e, "Failed to send notification");
            }
        });

        let mut pending = self.lock_pending();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending_notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
