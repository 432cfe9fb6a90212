//! Telegram Bot API notifier.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, warn};

use super::Notifier;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRY_ELAPSED: Duration = Duration::from_secs(30);

pub struct TelegramNotifier {
    http: Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: TELEGRAM_API_URL.to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.token)
    }
}

/// Rate limits and server errors are worth retrying; anything else
/// (bad token, malformed markup) will fail the same way again.
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let url = self.send_message_url();
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
        });
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(MAX_RETRY_ELAPSED),
            ..Default::default()
        };

        retry(policy, || {
            let request = self.http.post(&url).json(&body);
            async move {
                let resp = match request.send().await {
                    Ok(resp) => resp,
                    Err(e) => {
                        warn!(error = %e, "Telegram request failed, retrying");
                        return Err(backoff::Error::transient(anyhow!(e)));
                    }
                };

                let status = resp.status();
                if status.is_success() {
                    return Ok(());
                }

                let detail = resp.text().await.unwrap_or_default();
                let err = anyhow!("Telegram sendMessage failed: {} - {}", status, detail);
                if is_transient(status) {
                    warn!(status = %status, "Telegram rejected request, retrying");
                    Err(backoff::Error::transient(err))
                } else {
                    Err(backoff::Error::permanent(err))
                }
            }
        })
        .await?;

        debug!(chat_id = %self.chat_id, "Notification sent");
        Ok(())
    }
}
