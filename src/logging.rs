//! Logging setup: stdout plus an optional daily-rotated file.
//!
//! `RUST_LOG` overrides `--log-level` for stdout. The file log always
//! records DEBUG and above so a close loop can be reconstructed afterwards.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

const LOG_FILE_PREFIX: &str = "riskguard.log";

fn quiet_http(filter: EnvFilter) -> Result<EnvFilter> {
    Ok(filter
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?))
}

fn stdout_filter(log_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => {
            let level = log_level.to_lowercase();
            let base = EnvFilter::try_new(&level)
                .with_context(|| format!("Invalid log level: {}", log_level))?;
            quiet_http(base)
        }
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the life of the process.
pub fn init(log_level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_filter(stdout_filter(log_level)?);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(stdout_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(quiet_http(EnvFilter::new("debug"))?);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(stdout_filter("info").is_ok());
        assert!(stdout_filter("DEBUG").is_ok());
        assert!(stdout_filter("riskguard=bogus").is_err());
    }
}
