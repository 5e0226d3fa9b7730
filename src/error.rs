use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::storage::StorageError,
    providers::{IdentityError, ProviderError},
    state::state_machine::InvalidTransition,
};

/// Errors that can occur in service layer and room session operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or invalid bearer credential.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Valid identity, but not permitted for this room or action.
    #[error("access denied: {0}")]
    Authorization(String),
    /// Action not legal in the current room phase.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Unknown game or round.
    #[error("not found: {0}")]
    NotFound(String),
    /// A second answer for the same (round, user) pair.
    #[error("duplicate submission: {0}")]
    DuplicateSubmission(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Persistence collaborator failure.
    #[error("storage failure")]
    Storage(#[source] StorageError),
    /// Track provider or identity collaborator failure.
    #[error("provider failure")]
    Provider(#[source] ProviderError),
}

impl ServiceError {
    /// Stable machine-readable kind carried on typed error events so clients
    /// can distinguish rejections without parsing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Authentication(_) => "authentication",
            ServiceError::Authorization(_) => "authorization",
            ServiceError::InvalidState(_) => "invalid_state",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::DuplicateSubmission(_) => "duplicate_submission",
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::Storage(_) | ServiceError::Provider(_) => "upstream",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<ProviderError> for ServiceError {
    fn from(err: ProviderError) -> Self {
        ServiceError::Provider(err)
    }
}

impl From<IdentityError> for ServiceError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredential => ServiceError::Authentication(err.to_string()),
            IdentityError::Unavailable(source) => ServiceError::Provider(source),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or invalid credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated but not permitted.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current room state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Upstream collaborator unavailable.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Authentication(message) => AppError::Unauthorized(message),
            ServiceError::Authorization(message) => AppError::Forbidden(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::DuplicateSubmission(message) => AppError::Conflict(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Storage(source) => AppError::Upstream(source.to_string()),
            ServiceError::Provider(source) => AppError::Upstream(source.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
