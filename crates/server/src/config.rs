//! Environment-driven configuration and runtime feature flags.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

/// Static configuration read once at startup. Every secret is required;
/// the server refuses to start without them.
#[derive(Clone)]
pub struct AppConfig {
    /// Public URL prefix used when registering the webhook.
    pub base_url: String,
    /// Shared secret for the REST API (`X-Api-Secret-Key` header).
    pub api_secret: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub telegram_bot_token: String,
    /// Secret echoed back by Telegram on every webhook delivery.
    pub webhook_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: optional("ROLLCALL_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".into()),
            api_secret: required("ROLLCALL_API_SECRET")?,
            groq_api_key: required("GROQ_API_KEY")?,
            groq_model: optional("GROQ_MODEL").unwrap_or_else(|| "openai/gpt-oss-120b".into()),
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            webhook_secret: required("TELEGRAM_WEBHOOK_SECRET")?,
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .with_context(|| format!("{name} must be set"))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Runtime toggles. Initialized from the environment at startup and
/// reloadable through the admin API; shared process-wide behind an `Arc`.
#[derive(Clone)]
pub struct Flags {
    bot_disabled: Arc<AtomicBool>,
}

impl Flags {
    const BOT_DISABLED: &'static str = "ROLLCALL_BOT_DISABLED";

    pub fn from_env() -> Self {
        let flags = Self {
            bot_disabled: Arc::new(AtomicBool::new(false)),
        };
        flags.reload_from_env();
        flags
    }

    /// Re-read every toggle from the environment.
    pub fn reload_from_env(&self) {
        let disabled = std::env::var(Self::BOT_DISABLED)
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        self.bot_disabled.store(disabled, Ordering::Relaxed);
        tracing::info!(disabled, "bot-disabled flag loaded");
    }

    /// When set, the webhook answers every message with a downtime notice
    /// instead of running the conversation engine.
    pub fn bot_disabled(&self) -> bool {
        self.bot_disabled.load(Ordering::Relaxed)
    }
}
