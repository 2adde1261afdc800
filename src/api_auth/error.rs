//! Authentication error types.
//!
//! Provides structured error codes for challenge authentication failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::db::StoreError;
use crate::gateway::types::ErrorBody;

/// Authentication error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    /// Challenge does not match the expected structure
    Malformed,
    /// Challenge timestamp outside the validity window
    Expired,
    /// Signature does not verify against the claimed address
    BadSignature,
    /// Claimed address does not decode to a public key
    UnknownAddressFormat,
    /// Challenge was already redeemed
    DuplicateChallenge,
    /// Replay ledger could not be reached
    StoreUnavailable,
    /// Authentication outcome missing from the request
    Internal,
}

impl AuthErrorCode {
    /// Machine-readable code returned to the caller.
    pub fn name(self) -> &'static str {
        match self {
            Self::Malformed => "challenge_invalid",
            Self::Expired => "challenge_expired",
            Self::BadSignature => "signature_invalid",
            Self::UnknownAddressFormat => "address_invalid",
            Self::DuplicateChallenge => "challenge_already_used",
            Self::StoreUnavailable => "store_unavailable",
            Self::Internal => "internal_error",
        }
    }

    /// Get HTTP status code.
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::StoreUnavailable | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether a skip-listed route may downgrade this failure to `Skipped`.
    ///
    /// Replays are never downgraded.
    pub fn is_skippable(self) -> bool {
        !matches!(self, Self::DuplicateChallenge | Self::Internal)
    }
}

/// Authentication error with message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub code: AuthErrorCode,
    pub message: String,
}

impl AuthError {
    /// Create a new auth error.
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create error with default message.
    pub fn from_code(code: AuthErrorCode) -> Self {
        let message = match code {
            AuthErrorCode::Malformed => "The challenge you provided is not well formed.",
            AuthErrorCode::Expired => "The challenge you provided is outside its validity window.",
            AuthErrorCode::BadSignature => {
                "The signature you provided does not match the challenge and address."
            }
            AuthErrorCode::UnknownAddressFormat => {
                "The address you provided does not encode a public key."
            }
            AuthErrorCode::DuplicateChallenge => {
                "The challenge you provided was already used. You must resolve a new challenge \
                 for each API request."
            }
            AuthErrorCode::StoreUnavailable => "The authentication store is unavailable.",
            AuthErrorCode::Internal => "Internal server error.",
        };
        Self::new(code, message)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.name(), self.message)
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        if e.is_unique_violation() {
            AuthError::from_code(AuthErrorCode::DuplicateChallenge)
        } else {
            tracing::error!(error = %e, "Replay ledger unavailable");
            AuthError::from_code(AuthErrorCode::StoreUnavailable)
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ErrorBody::new(self.code.http_status(), self.code.name(), self.message).into_response()
    }
}
