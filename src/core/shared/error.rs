use axum::{response::IntoResponse, Json};
use tracing::error;

use crate::core::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Store error: {0}")]
    Store(StoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for CrmError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(what) => Self::Conflict(format!("Duplicate {what}")),
            StoreError::Missing => Self::NotFound("Record not found".to_string()),
            other => Self::Store(other),
        }
    }
}

impl CrmError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    /// Stable machine-readable tag returned next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Store(_) => "store",
            Self::Internal(_) => "internal",
        }
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Internal(_))
    }
}

impl IntoResponse for CrmError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Store(e) => {
                error!("Store failure while handling request: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Self::Internal(e) => {
                error!("Internal failure while handling request: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (
            status,
            Json(serde_json::json!({ "error": message, "kind": self.kind() })),
        )
            .into_response()
    }
}

pub type CrmResult<T> = Result<T, CrmError>;
