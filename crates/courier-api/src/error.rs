use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use courier_db::StoreError;

/// API-level error taxonomy. Every variant maps to a stable
/// machine-readable code and an HTTP status; the JSON body is
/// `{"error": code, "message": detail}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound,
            StoreError::PermissionDenied => Self::PermissionDenied,
            StoreError::Validation(msg) => Self::Validation(msg),
            other => {
                error!("store error: {}", other);
                Self::Internal
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        error!("spawn_blocking join error: {}", e);
        Self::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_their_codes() {
        let api: ApiError = StoreError::PermissionDenied.into();
        assert_eq!(api.code(), "PERMISSION_DENIED");
        assert_eq!(api.status(), StatusCode::FORBIDDEN);

        let api: ApiError = StoreError::Validation("too long".into()).into();
        assert_eq!(api.code(), "VALIDATION_ERROR");
        assert_eq!(api.to_string(), "too long");
    }

    #[test]
    fn opaque_store_errors_become_internal() {
        let api: ApiError = StoreError::LockPoisoned.into();
        assert_eq!(api.code(), "INTERNAL");
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
