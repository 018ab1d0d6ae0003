use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use rollcall_db::StoreError;

/// Unified API error type.
///
/// Produces `{"error": "<message>"}` JSON responses with the status implied
/// by the store error taxonomy: validation 400, not-found 404, conflict 409.
pub struct ApiErr {
    status: StatusCode,
    message: String,
}

impl ApiErr {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<StoreError> for ApiErr {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Invalid(message) => Self {
                status: StatusCode::BAD_REQUEST,
                message,
            },
            StoreError::NotFound(message) => Self {
                status: StatusCode::NOT_FOUND,
                message,
            },
            StoreError::Conflict(message) => Self {
                status: StatusCode::CONFLICT,
                message,
            },
            StoreError::Sqlite(_) | StoreError::Io(_) => {
                tracing::error!("store error: {e}");
                Self::internal("internal server error")
            }
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}
