//! Futures Risk Guard
//!
//! Watches one leveraged futures position, flattens it with re-quoted limit
//! orders when PnL crosses the stop-loss or take-profit line, and gates new
//! entries on exposure, direction and pending orders.

mod api;
mod bot;
mod logging;
mod models;
mod notify;
mod risk;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::api::{BinanceFuturesClient, DryRunGateway, ExchangeGateway, FUTURES_URL};
use crate::bot::{Bot, BotConfig, NoSignals};
use crate::models::PositionSide;
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::risk::{Admission, RiskController, RiskPolicy};

/// Position risk guard for Binance USDT-M futures.
#[derive(Parser)]
#[command(name = "riskguard")]
#[command(about = "Stop-loss / take-profit guard for a single futures position", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RISKGUARD_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Also write daily-rotated logs to this directory
    #[arg(long, env = "RISKGUARD_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(flatten)]
    risk: RiskArgs,

    #[command(flatten)]
    exchange: ExchangeArgs,

    #[command(flatten)]
    telegram: TelegramArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RiskArgs {
    /// Instrument to guard
    #[arg(long, env = "RISKGUARD_SYMBOL", default_value = "BTCUSDT", global = true)]
    symbol: String,

    /// Close when PnL % falls below this (negative)
    #[arg(
        long,
        env = "RISKGUARD_STOP_LOSS",
        default_value = "-4",
        allow_negative_numbers = true,
        global = true
    )]
    stop_loss: Decimal,

    /// Close when PnL % reaches this
    #[arg(long, env = "RISKGUARD_TAKE_PROFIT", default_value = "8", global = true)]
    take_profit: Decimal,

    /// No new entries at or above this position size
    #[arg(long, env = "RISKGUARD_MAX_SIZE", default_value = "0.004", global = true)]
    max_size: Decimal,

    /// Size of each entry order
    #[arg(long, env = "RISKGUARD_ORDER_SIZE", default_value = "0.002", global = true)]
    order_size: Decimal,

    /// Seconds between close-loop re-quotes
    #[arg(long, env = "RISKGUARD_POLL_SECS", default_value = "20", global = true)]
    poll_secs: u64,

    /// Give up on a close after this many seconds (unset: never)
    #[arg(long, env = "RISKGUARD_CLOSE_TIMEOUT_SECS", global = true)]
    close_timeout_secs: Option<u64>,
}

impl RiskArgs {
    fn policy(&self) -> RiskPolicy {
        RiskPolicy {
            stop_loss_pct: self.stop_loss,
            take_profit_pct: self.take_profit,
            max_exposure_size: self.max_size,
            order_poll_interval: Duration::from_secs(self.poll_secs),
            close_timeout: self.close_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Args)]
struct ExchangeArgs {
    #[arg(long, env = "BINANCE_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    #[arg(long, env = "BINANCE_API_SECRET", hide_env_values = true, global = true)]
    api_secret: Option<String>,

    /// REST root; point at the testnet to paper trade
    #[arg(long, env = "BINANCE_FUTURES_URL", default_value = FUTURES_URL, global = true)]
    futures_url: String,
}

impl ExchangeArgs {
    fn gateway(&self) -> Result<Arc<dyn ExchangeGateway>> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("BINANCE_API_KEY is not set"))?;
        let secret = self
            .api_secret
            .as_deref()
            .ok_or_else(|| anyhow!("BINANCE_API_SECRET is not set"))?;

        let client = BinanceFuturesClient::new(key, secret, &self.futures_url)?;
        Ok(Arc::new(client))
    }
}

#[derive(Args)]
struct TelegramArgs {
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true, global = true)]
    telegram_token: Option<String>,

    #[arg(long, env = "TELEGRAM_CHAT_ID", global = true)]
    telegram_chat_id: Option<String>,
}

impl TelegramArgs {
    fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        match (&self.telegram_token, &self.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Ok(Arc::new(TelegramNotifier::new(token, chat_id)?)),
            _ => {
                warn!("Telegram not configured, notifications go to the log");
                Ok(Arc::new(LogNotifier))
            }
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Long,
    Short,
}

impl From<SideArg> for PositionSide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Long => PositionSide::Long,
            SideArg::Short => PositionSide::Short,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Guard the position on a fixed tick until Ctrl+C
    Run {
        /// Read real state but only log cancels and orders
        #[arg(long)]
        dry_run: bool,

        /// Let Ctrl+C stop a close in progress
        #[arg(long)]
        interruptible_close: bool,

        /// Seconds between ticks
        #[arg(long, env = "RISKGUARD_TICK_SECS", default_value = "5")]
        tick_secs: u64,
    },

    /// Show position, book, last trade and entry admission
    Status,

    /// Close the position now
    Flatten,

    /// Open or add to a position, if admission allows
    Open {
        #[arg(long, value_enum)]
        side: SideArg,

        /// Defaults to --order-size
        #[arg(long)]
        size: Option<Decimal>,
    },

    /// Show the effective risk configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = logging::init(&cli.log_level, cli.log_dir.as_deref())?;

    let mut policy = cli.risk.policy();
    policy.validate()?;

    match cli.command {
        Commands::Config => {
            println!("\n=== Risk Configuration ===\n");
            println!("  Symbol:               {}", cli.risk.symbol);
            println!("  Stop Loss:            {}%", policy.stop_loss_pct);
            println!("  Take Profit:          {}%", policy.take_profit_pct);
            println!("  Max Exposure:         {}", policy.max_exposure_size);
            println!("  Order Size:           {}", cli.risk.order_size);
            println!("  Close Poll Interval:  {}s", policy.order_poll_interval.as_secs());
            match policy.close_timeout {
                Some(t) => println!("  Close Timeout:        {}s", t.as_secs()),
                None => println!("  Close Timeout:        none (retry until flat)"),
            }
            println!("\nExchange:");
            println!("  REST URL:             {}", cli.exchange.futures_url);
            println!(
                "  Credentials:          {}",
                if cli.exchange.api_key.is_some() && cli.exchange.api_secret.is_some() {
                    "set"
                } else {
                    "missing"
                }
            );
            println!(
                "  Telegram:             {}",
                if cli.telegram.telegram_token.is_some() && cli.telegram.telegram_chat_id.is_some() {
                    "configured"
                } else {
                    "log only"
                }
            );
        }

        Commands::Run {
            dry_run,
            interruptible_close,
            tick_secs,
        } => {
            let mut gateway = cli.exchange.gateway()?;
            if dry_run {
                gateway = Arc::new(DryRunGateway::new(gateway));
                // Simulated closes never fill.
                if policy.close_timeout.is_none() {
                    policy.close_timeout = Some(policy.order_poll_interval * 3);
                }
            }

            let controller = RiskController::new(
                cli.risk.symbol.clone(),
                policy.clone(),
                gateway,
                cli.telegram.notifier()?,
            )?;
            let bot_config = BotConfig {
                tick_interval: Duration::from_secs(tick_secs),
                order_size: cli.risk.order_size,
                interruptible_close,
            };

            info!(
                symbol = %cli.risk.symbol,
                stop_loss = %policy.stop_loss_pct,
                take_profit = %policy.take_profit_pct,
                max_size = %policy.max_exposure_size,
                dry_run = dry_run,
                "Starting risk guard"
            );

            println!("\n=== Futures Risk Guard ===");
            println!("Symbol: {}", cli.risk.symbol);
            println!(
                "Stop loss / take profit: {}% / {}%",
                policy.stop_loss_pct, policy.take_profit_pct
            );
            println!("Tick: {}s", tick_secs);
            println!("Mode: {}", if dry_run { "DRY RUN (no real orders)" } else { "LIVE TRADING" });
            println!("\nPress Ctrl+C to stop.\n");

            let mut bot = Bot::new(bot_config, controller, Box::new(NoSignals));
            if let Err(e) = bot.run().await {
                tracing::error!(error = %e, "Bot error");
            }

            println!("\n{}", bot.stats());
        }

        Commands::Status => {
            let controller = RiskController::new(
                cli.risk.symbol.clone(),
                policy,
                cli.exchange.gateway()?,
                Arc::new(LogNotifier),
            )?;

            let report = controller
                .status()
                .await
                .context("Failed to read position")?;
            println!("\n=== {} ===\n{}", cli.risk.symbol, report);
        }

        Commands::Flatten => {
            let controller = RiskController::new(
                cli.risk.symbol.clone(),
                policy,
                cli.exchange.gateway()?,
                cli.telegram.notifier()?,
            )?;

            let outcome = controller.force_flatten().await;
            controller.flush_notifications().await;
            println!("{}: {}", cli.risk.symbol, outcome);
            if !outcome.is_closed() {
                return Err(anyhow!("{} is still open", cli.risk.symbol));
            }
        }

        Commands::Open { side, size } => {
            let side = PositionSide::from(side);
            let size = size.unwrap_or(cli.risk.order_size);
            let max = policy.max_exposure_size;
            let controller = RiskController::new(
                cli.risk.symbol.clone(),
                policy,
                cli.exchange.gateway()?,
                cli.telegram.notifier()?,
            )?;

            match controller.check_admission(side, max).await? {
                Admission::Denied(reason) => {
                    println!("Entry denied: {}", reason);
                }
                Admission::Allowed => {
                    let order_id = controller.open(side, size).await?;
                    controller.flush_notifications().await;
                    println!("Placed {} entry for {} {}: order {}", side, size, cli.risk.symbol, order_id);
                }
            }
        }
    }

    Ok(())
}
