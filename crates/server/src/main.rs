mod config;
mod error;
mod routes;
mod telegram;

use std::path::PathBuf;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rollcall_bot::BotEngine;
use rollcall_db::Db;
use rollcall_llm::GroqClient;

use config::{AppConfig, Flags};
use telegram::TelegramClient;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub flags: Flags,
    pub engine: BotEngine<GroqClient>,
    pub telegram: TelegramClient,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Flags {
    fn from_ref(state: &AppState) -> Self {
        state.flags.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall_server=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    let flags = Flags::from_env();

    let data_dir = std::env::var("ROLLCALL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));
    tracing::info!("data directory: {}", data_dir.display());

    let db = Db::open(&data_dir.join("rollcall.db"))?;
    tracing::info!("database initialized");

    let parser = GroqClient::new(config.groq_api_key.clone())?.with_model(config.groq_model.clone());
    let engine = BotEngine::new(db.clone(), parser);
    let telegram = TelegramClient::new(config.telegram_bot_token.clone())?;

    let state = AppState {
        db,
        config,
        flags,
        engine,
        telegram,
    };

    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Chat pipeline over REST
        .route("/main", get(routes::chat::chat_turn))
        // Users
        .route(
            "/users",
            post(routes::users::register).get(routes::users::list),
        )
        // Subjects and timetable slots
        .route(
            "/attendance/subjects",
            post(routes::attendance::create_subject).delete(routes::attendance::delete_subject),
        )
        .route(
            "/attendance/slots",
            post(routes::attendance::add_slot)
                .put(routes::attendance::update_slot)
                .delete(routes::attendance::delete_slot),
        )
        // Attendance
        .route("/attendance/mark", post(routes::attendance::mark))
        .route(
            "/attendance/timetable/{contact_id}/{day}",
            get(routes::attendance::daily_timetable),
        )
        .route(
            "/attendance/stats/{contact_id}",
            get(routes::attendance::stats),
        )
        .route(
            "/attendance/logs/{contact_id}",
            get(routes::attendance::logs_for_date),
        )
        // Admin
        .route("/admin/flags/reload", post(routes::admin::reload_flags))
        .route("/admin/pending/purge", post(routes::admin::purge_pending));

    let app = Router::new()
        .nest("/api", api)
        .route(
            "/adapters/telegram/webhook",
            post(routes::webhook::telegram_webhook),
        )
        .route(
            "/adapters/telegram/set-webhook",
            get(routes::webhook::set_webhook),
        )
        .route(
            "/adapters/telegram/delete-webhook",
            get(routes::webhook::delete_webhook),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("listening on port {port}");
    axum::serve(listener, app).await?;

    Ok(())
}
