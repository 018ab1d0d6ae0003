//! Minimal Telegram Bot API client (outbound only).

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::json;

const API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            token,
        })
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.call("sendMessage", &json!({"chat_id": chat_id, "text": text}))
            .await
    }

    pub async fn set_webhook(&self, url: &str, secret_token: &str) -> Result<()> {
        self.call("setWebhook", &json!({"url": url, "secret_token": secret_token}))
            .await
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        self.call("deleteWebhook", &json!({})).await
    }

    async fn call(&self, method: &str, body: &serde_json::Value) -> Result<()> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("calling {method}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("{method} failed: HTTP {status}: {text}");
        }
        Ok(())
    }
}
