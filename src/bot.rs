//! Bot runner: the periodic driver around the risk controller.
//!
//! Each tick:
//! - Clears resting orders and checks PnL thresholds (closing if breached)
//! - Asks the signal source for an entry
//! - Runs admission control, then places the entry order

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::models::PositionSide;
use crate::risk::{Admission, CloseOutcome, RiskController, ThresholdAction};

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// How often the driver ticks
    pub tick_interval: Duration,

    /// Size of each entry order
    pub order_size: Decimal,

    /// Let Ctrl+C stop a close loop in progress
    pub interruptible_close: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            order_size: dec!(0.002),
            interruptible_close: false,
        }
    }
}

/// Source of entry decisions. The risk layer decides whether an entry is
/// allowed; this only says which direction is wanted.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn next_entry(&self, symbol: &str) -> Result<Option<PositionSide>>;
}

/// Never asks for an entry: the bot only manages existing exposure.
pub struct NoSignals;

#[async_trait]
impl SignalSource for NoSignals {
    async fn next_entry(&self, _symbol: &str) -> Result<Option<PositionSide>> {
        Ok(None)
    }
}

/// Main bot runner.
pub struct Bot {
    config: BotConfig,
    controller: RiskController,
    signals: Box<dyn SignalSource>,
    stats: BotStats,

    // Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl Bot {
    pub fn new(config: BotConfig, controller: RiskController, signals: Box<dyn SignalSource>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let controller = if config.interruptible_close {
            controller.with_interrupt(shutdown.clone())
        } else {
            controller
        };

        Self {
            config,
            controller,
            signals,
            stats: BotStats::new(),
            shutdown,
        }
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> &BotStats {
        &self.stats
    }

    /// Main run loop. Returns after Ctrl+C.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            symbol = %self.controller.symbol(),
            tick_secs = self.config.tick_interval.as_secs(),
            order_size = %self.config.order_size,
            interruptible_close = self.config.interruptible_close,
            "Starting bot run loop"
        );

        let mut ticker = interval(self.config.tick_interval);
        // A close loop can hold a tick for minutes; don't burst afterwards.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Register shutdown handler
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });

        while !self.shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            if let Err(e) = self.tick().await {
                error!(error = %e, "Error in bot tick");
            }
        }

        self.controller.flush_notifications().await;
        info!("Bot stopped\n{}", self.stats);
        Ok(())
    }

    /// Single iteration of the main loop.
    async fn tick(&mut self) -> Result<()> {
        self.stats.ticks += 1;
        debug!(tick = self.stats.ticks, "Bot tick");

        // 1. Manage the existing position
        match self.controller.manage_position().await {
            Some(evaluation) => {
                if let Some(outcome) = evaluation.outcome {
                    self.stats.record_close(evaluation.action, &outcome);
                    // Re-enter on a later tick, against a settled position.
                    return Ok(());
                }
            }
            None => self.stats.failed_checks += 1,
        }

        // 2. Entry signal
        let symbol = self.controller.symbol().to_string();
        let Some(side) = self
            .signals
            .next_entry(&symbol)
            .await
            .context("Signal source failed")?
        else {
            return Ok(());
        };

        // 3. Admission control, then open
        let max = self.controller.policy().max_exposure_size;
        let admission = self.controller.check_admission(side, max).await?;
        if let Admission::Denied(reason) = admission {
            debug!(side = %side, reason = %reason, "Entry skipped");
            self.stats.entries_denied += 1;
            return Ok(());
        }

        match self.controller.open(side, self.config.order_size).await {
            Ok(order_id) => {
                info!(order_id = %order_id, side = %side, "Entry submitted");
                self.stats.entries_submitted += 1;
            }
            Err(e) => {
                warn!(side = %side, error = %e, "Entry failed");
                self.stats.entries_failed += 1;
            }
        }

        Ok(())
    }
}

/// Bot statistics.
#[derive(Debug, Clone)]
pub struct BotStats {
    pub started_at: DateTime<Utc>,
    pub ticks: u64,
    pub failed_checks: u64,
    pub stop_losses: u64,
    pub take_profits: u64,
    pub unconfirmed_closes: u64,
    pub entries_submitted: u64,
    pub entries_denied: u64,
    pub entries_failed: u64,
}

impl BotStats {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ticks: 0,
            failed_checks: 0,
            stop_losses: 0,
            take_profits: 0,
            unconfirmed_closes: 0,
            entries_submitted: 0,
            entries_denied: 0,
            entries_failed: 0,
        }
    }

    fn record_close(&mut self, action: ThresholdAction, outcome: &CloseOutcome) {
        if !outcome.is_closed() {
            self.unconfirmed_closes += 1;
            return;
        }
        match action {
            ThresholdAction::CloseStopLoss => self.stop_losses += 1,
            ThresholdAction::CloseTakeProfit => self.take_profits += 1,
            ThresholdAction::None => {}
        }
    }
}

impl fmt::Display for BotStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uptime = Utc::now() - self.started_at;
        writeln!(f, "=== Bot Statistics ===")?;
        writeln!(f, "Uptime:          {}m", uptime.num_minutes())?;
        writeln!(f, "Ticks:           {} ({} failed checks)", self.ticks, self.failed_checks)?;
        writeln!(
            f,
            "Closes:          {} stop-loss, {} take-profit, {} unconfirmed",
            self.stop_losses, self.take_profits, self.unconfirmed_closes
        )?;
        writeln!(
            f,
            "Entries:         {} submitted, {} denied, {} failed",
            self.entries_submitted, self.entries_denied, self.entries_failed
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::scripted::{long_position, ScriptedGateway};
    use crate::models::OrderSide;
    use crate::notify::recording::RecordingNotifier;
    use crate::risk::RiskPolicy;

    struct FixedSignal(Option<PositionSide>);

    #[async_trait]
    impl SignalSource for FixedSignal {
        async fn next_entry(&self, _symbol: &str) -> Result<Option<PositionSide>> {
            Ok(self.0)
        }
    }

    fn make_bot(gateway: &Arc<ScriptedGateway>, signal: Option<PositionSide>) -> Bot {
        let controller = RiskController::new(
            "BTCUSDT",
            RiskPolicy::default(),
            gateway.clone(),
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap();
        Bot::new(BotConfig::default(), controller, Box::new(FixedSignal(signal)))
    }

    #[tokio::test]
    async fn test_tick_opens_when_admitted() {
        let gateway = Arc::new(ScriptedGateway::new("BTCUSDT").with_book(dec!(100.0), dec!(100.5)));
        let mut bot = make_bot(&gateway, Some(PositionSide::Long));

        bot.tick().await.unwrap();

        assert_eq!(gateway.cancel_calls(), 1);
        let submitted = gateway.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].side, OrderSide::Buy);
        assert_eq!(submitted[0].size, dec!(0.002));
        assert_eq!(bot.stats().entries_submitted, 1);
    }

    #[tokio::test]
    async fn test_tick_respects_admission() {
        let gateway = Arc::new(
            ScriptedGateway::new("BTCUSDT")
                .with_position(Some(long_position("BTCUSDT", dec!(0.004), dec!(1)))),
        );
        let mut bot = make_bot(&gateway, Some(PositionSide::Long));

        bot.tick().await.unwrap();

        assert!(gateway.submitted().is_empty());
        assert_eq!(bot.stats().entries_denied, 1);
    }

    #[tokio::test]
    async fn test_tick_without_signal_only_manages() {
        let gateway = Arc::new(ScriptedGateway::new("BTCUSDT"));
        let mut bot = make_bot(&gateway, None);

        bot.tick().await.unwrap();
        bot.tick().await.unwrap();

        assert_eq!(gateway.cancel_calls(), 2);
        assert_eq!(gateway.order_reads(), 0);
        assert_eq!(bot.stats().ticks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_skips_entry_after_close() {
        let gateway = Arc::new(
            ScriptedGateway::new("BTCUSDT")
                .with_position(Some(long_position("BTCUSDT", dec!(0.002), dec!(-6))))
                .with_position(None),
        );
        let mut bot = make_bot(&gateway, Some(PositionSide::Short));

        bot.tick().await.unwrap();

        assert!(gateway.submitted().is_empty());
        assert_eq!(bot.stats().stop_losses, 1);
        assert_eq!(bot.stats().entries_submitted, 0);
    }

    #[tokio::test]
    async fn test_run_returns_on_shutdown() {
        let gateway = Arc::new(ScriptedGateway::new("BTCUSDT"));
        let mut bot = make_bot(&gateway, None);

        bot.shutdown_signal().store(true, Ordering::SeqCst);
        bot.run().await.unwrap();

        assert_eq!(bot.stats().ticks, 0);
    }
}
