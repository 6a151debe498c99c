//! REST error taxonomy.
//!
//! Core errors propagate to this boundary unaltered; here they are mapped
//! to HTTP statuses and rendered as the JSON envelope
//! `{"error": {"message", "statusCode"}}` with no stack content.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::storage::StorageError;
use crate::validator::ValidatorError;

/// error type for the REST surface
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidatorError),

    /// PATCH without a usable body
    #[error("missing body")]
    MissingBody,

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// The HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Storage(e) => match e {
                StorageError::RepoDoesNotExist(_)
                | StorageError::InvalidBranch(_)
                | StorageError::FileNotFound(_) => StatusCode::NOT_FOUND,
                StorageError::RevisionNotFound(_) | StorageError::InvalidName(_) => {
                    StatusCode::BAD_REQUEST
                }
                StorageError::OptimisticConcurrency { .. } => StatusCode::PRECONDITION_FAILED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Validation(_) | ApiError::MissingBody | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
        }

        let body = json!({
            "error": {
                "message": self.to_string(),
                "statusCode": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {e}"))
    }
}
