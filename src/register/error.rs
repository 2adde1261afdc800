//! Provisioning error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::validation::ValidationError;
use crate::db::StoreError;
use crate::gateway::types::ErrorBody;

const USER_NOT_FOUND_MESSAGE: &str = "The username and secret pair you specified is not \
     associated with any existing user.";

#[derive(Error, Debug, Clone)]
pub enum ProvisionError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("{}", USER_NOT_FOUND_MESSAGE)]
    NotFound,

    /// Known user, wrong secret. Rendered exactly like `NotFound`.
    #[error("{}", USER_NOT_FOUND_MESSAGE)]
    CredentialMismatch,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),

    /// The mint-side user could not be created. The service must stop.
    #[error("Mint user creation failed for {username}: {reason}")]
    Unrecoverable { username: String, reason: String },
}

impl ProvisionError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ProvisionError::InvalidUsername(_) => "username_invalid",
            ProvisionError::NotFound | ProvisionError::CredentialMismatch => "user_not_found",
            ProvisionError::Store(_) => "store_unavailable",
            ProvisionError::Internal(_) | ProvisionError::Unrecoverable { .. } => "internal_error",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ProvisionError::InvalidUsername(_)
            | ProvisionError::NotFound
            | ProvisionError::CredentialMismatch => StatusCode::BAD_REQUEST,
            ProvisionError::Store(_)
            | ProvisionError::Internal(_)
            | ProvisionError::Unrecoverable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, ProvisionError::Unrecoverable { .. })
    }

    /// Message safe to show the caller. Server-side details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ProvisionError::Store(_) => "The user store is unavailable.".to_string(),
            ProvisionError::Internal(_) | ProvisionError::Unrecoverable { .. } => {
                "An internal error occurred.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<ValidationError> for ProvisionError {
    fn from(e: ValidationError) -> Self {
        ProvisionError::InvalidUsername(e.to_string())
    }
}

impl IntoResponse for ProvisionError {
    fn into_response(self) -> Response {
        ErrorBody::new(self.http_status(), self.code(), self.public_message()).into_response()
    }
}
