//! API response types
//!
//! - `ErrorBody`: error envelope shared by every failing route
//! - response DTOs for the handlers

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api_auth::AuthenticationStatus;

// ============================================================================
// Error Envelope
// ============================================================================

/// Error envelope: `{"status", "code", "message"}`
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct ErrorBody {
    /// HTTP status, repeated in the body
    #[schema(example = 400)]
    pub status: u16,
    /// Machine-readable error code
    #[schema(example = "challenge_already_used")]
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Fresh challenges for the caller to sign
#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengesResponse {
    #[schema(example = json!(["mint.example.com.1700000000.8f1c0e9a4b7d2c3e5f60718293a4b5c6"]))]
    pub challenges: Vec<String>,
}

/// Authentication outcome as resolved by the gate
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthenticationResponse {
    #[schema(value_type = String, example = "succeeded")]
    pub status: AuthenticationStatus,
    /// Hex-encoded Ed25519 public key, present when authenticated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub livemode: bool,
}
