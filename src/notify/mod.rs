//! Notification port: outbound alerts about risk actions.

pub mod messages;
mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

pub use telegram::TelegramNotifier;

/// Delivers a formatted text alert. Callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Writes alerts to the log instead of a chat. Used when no Telegram
/// credentials are configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        info!(message = %text, "Notification");
        Ok(())
    }
}

#[cfg(test)]
pub mod recording {
    use std::sync::Mutex;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::Notifier;

    /// Captures sent messages; optionally fails every send, after an
    /// optional delay.
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        /// Hangs for `delay`, then fails, like a chat API that is down.
        pub fn stalled(delay: Duration) -> Self {
            Self {
                fail: true,
                delay: Some(delay),
                ..Default::default()
            }
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, text: &str) -> Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.sent.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(anyhow!("chat unreachable"));
            }
            Ok(())
        }
    }
}
