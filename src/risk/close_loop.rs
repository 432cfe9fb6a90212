//! Close-position state machine.
//!
//! Each cycle re-reads the position, cancels whatever is resting, and
//! re-quotes a limit order for the full remaining size at the touch on the
//! closing side. The loop only ends once the exchange reports the position
//! flat, unless one of the opt-in escape hatches (max duration, interrupt
//! flag) fires. Both are checked at the top of a cycle, never mid-submission.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::api::ExchangeGateway;
use crate::models::{CloseAttempt, OrderBookTop, PositionSide, PositionSnapshot};

use super::{book::read_top_of_book, snapshot::read_snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseState {
    Evaluating,
    SubmittingClose,
    Waiting,
    Closed,
}

/// How a close loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed { cycles: u32 },
    TimedOut { cycles: u32, elapsed: Duration },
    Interrupted { cycles: u32 },
}

impl CloseOutcome {
    pub fn is_closed(&self) -> bool {
        matches!(self, CloseOutcome::Closed { .. })
    }

    pub fn cycles(&self) -> u32 {
        match self {
            CloseOutcome::Closed { cycles }
            | CloseOutcome::TimedOut { cycles, .. }
            | CloseOutcome::Interrupted { cycles } => *cycles,
        }
    }
}

impl fmt::Display for CloseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseOutcome::Closed { cycles } => write!(f, "closed after {} cycle(s)", cycles),
            CloseOutcome::TimedOut { cycles, elapsed } => write!(
                f,
                "gave up after {} cycle(s) in {}s, position still open",
                cycles,
                elapsed.as_secs()
            ),
            CloseOutcome::Interrupted { cycles } => {
                write!(f, "interrupted after {} cycle(s), position still open", cycles)
            }
        }
    }
}

/// Closing order for `snapshot`: sell a long at the ask, buy a short back
/// at the bid, full size. `None` when flat.
pub fn plan_close(snapshot: &PositionSnapshot, book: &OrderBookTop) -> Option<CloseAttempt> {
    let side = snapshot.side().exit_order_side()?;
    let price = match snapshot.side() {
        PositionSide::Long => book.best_ask,
        PositionSide::Short => book.best_bid,
        PositionSide::Flat => return None,
    };
    Some(CloseAttempt {
        side,
        size: snapshot.size(),
        price,
    })
}

pub struct CloseLoop<'a> {
    gateway: &'a dyn ExchangeGateway,
    symbol: &'a str,
    poll_interval: Duration,
    max_duration: Option<Duration>,
    interrupt: Option<&'a AtomicBool>,
}

impl<'a> CloseLoop<'a> {
    pub fn new(gateway: &'a dyn ExchangeGateway, symbol: &'a str, poll_interval: Duration) -> Self {
        Self {
            gateway,
            symbol,
            poll_interval,
            max_duration: None,
            interrupt: None,
        }
    }

    pub fn with_max_duration(mut self, max_duration: Option<Duration>) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Option<&'a AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Drive the position to flat.
    pub async fn run(&self) -> CloseOutcome {
        let started = Instant::now();
        let mut cycles = 0u32;

        info!(symbol = %self.symbol, "Close loop started");

        loop {
            if self.interrupt.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                warn!(symbol = %self.symbol, cycles, "Close loop interrupted, position may still be open");
                return CloseOutcome::Interrupted { cycles };
            }
            if let Some(max) = self.max_duration {
                let elapsed = started.elapsed();
                if elapsed >= max {
                    error!(
                        symbol = %self.symbol,
                        cycles,
                        elapsed_secs = elapsed.as_secs(),
                        "Close loop timed out, position may still be open"
                    );
                    return CloseOutcome::TimedOut { cycles, elapsed };
                }
            }

            cycles += 1;
            if self.cycle(cycles).await == CloseState::Closed {
                info!(symbol = %self.symbol, cycles, "Position closed");
                return CloseOutcome::Closed { cycles };
            }

            debug!(
                symbol = %self.symbol,
                state = ?CloseState::Waiting,
                wait_secs = self.poll_interval.as_secs(),
                "Waiting for fill"
            );
            sleep(self.poll_interval).await;
        }
    }

    /// One pass. Any failure ends the cycle early; the caller waits and
    /// starts over from a fresh snapshot.
    async fn cycle(&self, cycle: u32) -> CloseState {
        debug!(symbol = %self.symbol, cycle, state = ?CloseState::Evaluating, "Close cycle");

        let snapshot = match read_snapshot(self.gateway, self.symbol).await {
            Ok(s) => s,
            Err(e) => {
                warn!(symbol = %self.symbol, cycle, error = %e, "Position read failed, retrying next cycle");
                return CloseState::Waiting;
            }
        };
        if snapshot.is_flat() {
            return CloseState::Closed;
        }

        if let Err(e) = self.gateway.cancel_all_orders(self.symbol).await {
            warn!(symbol = %self.symbol, cycle, error = %e, "Cancel failed, retrying next cycle");
            return CloseState::Waiting;
        }

        let book = match read_top_of_book(self.gateway, self.symbol).await {
            Ok(b) => b,
            Err(e) => {
                warn!(
                    symbol = %self.symbol,
                    cycle,
                    error = %e,
                    retryable = e.is_retryable(),
                    "No usable book, retrying next cycle"
                );
                return CloseState::Waiting;
            }
        };

        let Some(attempt) = plan_close(&snapshot, &book) else {
            return CloseState::Closed;
        };

        let price = match self.gateway.round_price(self.symbol, attempt.price).await {
            Ok(p) => p,
            Err(e) => {
                warn!(symbol = %self.symbol, cycle, error = %e, "Price rounding failed, retrying next cycle");
                return CloseState::Waiting;
            }
        };

        debug!(symbol = %self.symbol, cycle, state = ?CloseState::SubmittingClose, "Submitting close");
        match self
            .gateway
            .submit_limit_order(self.symbol, attempt.side, price, attempt.size)
            .await
        {
            Ok(order_id) => info!(
                symbol = %self.symbol,
                cycle,
                order_id = %order_id,
                side = %attempt.side,
                size = %attempt.size,
                price = %price,
                "Close order submitted"
            ),
            Err(e) => warn!(
                symbol = %self.symbol,
                cycle,
                side = %attempt.side,
                error = %e,
                "Close order failed, retrying next cycle"
            ),
        }

        CloseState::Waiting
    }
}
