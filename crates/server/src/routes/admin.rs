//! Operator endpoints: flag reload and pending-row hygiene.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use rollcall_db::Db;

use crate::config::Flags;
use crate::error::ApiErr;
use crate::routes::ApiSecret;

#[derive(Serialize)]
pub struct FlagsResponse {
    pub bot_disabled: bool,
}

/// POST /api/admin/flags/reload — re-read runtime toggles from the
/// environment.
pub async fn reload_flags(_auth: ApiSecret, State(flags): State<Flags>) -> Json<FlagsResponse> {
    flags.reload_from_env();
    Json(FlagsResponse {
        bot_disabled: flags.bot_disabled(),
    })
}

#[derive(Serialize)]
pub struct PurgeResponse {
    pub purged: usize,
}

/// POST /api/admin/pending/purge — delete expired unconfirmed pending rows.
/// Expiry itself is soft; this only reclaims storage.
pub async fn purge_pending(
    _auth: ApiSecret,
    State(db): State<Db>,
) -> Result<Json<PurgeResponse>, ApiErr> {
    let purged = db.purge_expired_pending(chrono::Utc::now())?;
    Ok(Json(PurgeResponse { purged }))
}
