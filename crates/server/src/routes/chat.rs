//! The chat pipeline exposed over REST, mirroring what the webhook does for
//! Telegram deliveries.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::routes::ApiSecret;

#[derive(Deserialize)]
pub struct ChatQuery {
    pub user_message: String,
    pub contact_id: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub contact_id: String,
    pub reply: String,
}

/// GET /api/main — run one conversation turn.
///
/// The reply is either the confirmation prompt for a freshly parsed intent,
/// the execution summary after a "yes", or a cancellation acknowledgment.
pub async fn chat_turn(
    _auth: ApiSecret,
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> Json<ChatResponse> {
    let reply = state
        .engine
        .handle_message(&query.contact_id, &query.user_message)
        .await;
    Json(ChatResponse {
        contact_id: query.contact_id,
        reply,
    })
}
