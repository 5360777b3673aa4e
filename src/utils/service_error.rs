// Resolver/redirect-path error type: one `thiserror`-derived enum per layer,
// with `IntoResponse` implemented only at the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("short code not found")]
    NotFound,

    #[error("link has expired")]
    Expired,

    #[error("link is disabled")]
    Disabled,

    #[error("password required")]
    PasswordRequired,

    #[error("authoritative store unavailable: {0}")]
    StoreUnavailable(String),
}

impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ResolveError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ResolveError::Expired => (StatusCode::GONE, "link has expired".to_string()),
            ResolveError::Disabled => (StatusCode::FORBIDDEN, "link is disabled".to_string()),
            ResolveError::PasswordRequired => {
                (StatusCode::UNAUTHORIZED, "password required".to_string())
            },
            ResolveError::StoreUnavailable(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            },
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<diesel::result::Error> for ResolveError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => ResolveError::NotFound,
            other => ResolveError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for ResolveError {
    fn from(error: redis::RedisError) -> Self {
        ResolveError::StoreUnavailable(error.to_string())
    }
}
