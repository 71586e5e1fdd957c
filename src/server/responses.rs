use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::domain::completion::CompletionError;
use crate::domain::ports::StoreError;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Errors returned by the HTTP handlers.
///
/// Messages are safe to show to clients; store internals never appear in them.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => {
                ApiError::NotFound("Signature request not found".to_string())
            }
            StoreError::Backend(_) => ApiError::Internal("Internal server error".to_string()),
        }
    }
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::NotFound(_) => ApiError::NotFound("Document not found".to_string()),
            CompletionError::NotPending(status) => {
                ApiError::Conflict(format!("Document is already {status}"))
            }
            CompletionError::InProgress(_) => {
                ApiError::Conflict("Document completion already in progress".to_string())
            }
            CompletionError::Rejected(rejection) => ApiError::BadRequest(rejection.to_string()),
            CompletionError::Store { step, .. } => ApiError::Internal(format!("Failed to {step}")),
        }
    }
}
