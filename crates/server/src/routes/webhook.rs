//! Telegram webhook adapter.
//!
//! Flow: Telegram posts an update, the secret header is verified, the
//! message is reduced to `(contact_id, text)` and handed to the conversation
//! engine, and the reply goes back through the Bot API.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::ApiErr;
use crate::routes::ApiSecret;

const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Subset of a Telegram update we care about.
#[derive(Debug, Deserialize)]
pub struct Update {
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(rename = "from")]
    sender: Sender,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Sender {
    id: i64,
}

/// POST /adapters/telegram/webhook — receive updates from Telegram.
///
/// Always answers `{"ok": true}` once the secret checks out: Telegram
/// redelivers on error responses, and a duplicate confirmation is worse
/// than a dropped reply.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let provided = headers
        .get(TELEGRAM_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided != Some(state.config.webhook_secret.as_str()) {
        return Err(ApiErr::forbidden("Forbidden"));
    }

    let ok = Json(json!({"ok": true}));
    let Some(message) = update.message else {
        return Ok(ok);
    };
    let Some(text) = message.text else {
        return Ok(ok);
    };
    let chat_id = message.chat.id;
    let contact_id = message.sender.id.to_string();

    let reply = if state.flags.bot_disabled() {
        "Sorry, the bot is temporarily down.".to_string()
    } else {
        state.engine.handle_message(&contact_id, &text).await
    };

    if let Err(e) = state.telegram.send_message(chat_id, &reply).await {
        tracing::error!(chat_id, "sending reply failed: {e}");
    }

    Ok(ok)
}

/// GET /adapters/telegram/set-webhook — register our webhook with Telegram.
pub async fn set_webhook(
    _auth: ApiSecret,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let url = format!("{}/adapters/telegram/webhook", state.config.base_url);
    state
        .telegram
        .set_webhook(&url, &state.config.webhook_secret)
        .await
        .map_err(|e| {
            tracing::error!("set webhook: {e}");
            ApiErr::internal("failed to set webhook")
        })?;
    Ok(Json(json!({"status": "Webhook set successfully", "url": url})))
}

/// GET /adapters/telegram/delete-webhook — unregister the webhook.
pub async fn delete_webhook(
    _auth: ApiSecret,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    state.telegram.delete_webhook().await.map_err(|e| {
        tracing::error!("delete webhook: {e}");
        ApiErr::internal("failed to delete webhook")
    })?;
    Ok(Json(json!({"status": "Webhook deleted"})))
}
