//! Telegram alerts
//!
//! Optional outbound notification channel. Delivery failures are logged and
//! swallowed - an alert must never block or roll back a trade.

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            token,
            chat_id,
        }
    }

    /// Build from `TELEGRAM_TOKEN` / `TELEGRAM_CHAT_ID`; `None` when the
    /// channel is not configured.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("TELEGRAM_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok()?;
        if token.is_empty() || chat_id.is_empty() {
            return None;
        }
        Some(Self::new(token, chat_id))
    }

    /// Fire-and-forget text alert.
    pub async fn send_alert(&self, text: &str) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Telegram alert delivered");
            }
            Ok(response) => {
                warn!("Telegram alert rejected with status {}", response.status());
            }
            Err(e) => {
                warn!("Telegram alert failed: {}", e);
            }
        }
    }
}
