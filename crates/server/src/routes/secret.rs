//! Shared-secret request guard for the REST API.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use crate::config::AppConfig;
use crate::error::ApiErr;

pub const API_SECRET_HEADER: &str = "x-api-secret-key";

/// Extractor that rejects requests without the correct `X-Api-Secret-Key`
/// header.
pub struct ApiSecret;

impl<S> FromRequestParts<S> for ApiSecret
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let provided = parts
            .headers
            .get(API_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(config.api_secret.as_str()) {
            return Err(ApiErr::forbidden("Forbidden"));
        }
        Ok(Self)
    }
}
