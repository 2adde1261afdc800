//! Authentication models and types.

use axum::extract::FromRequestParts;
use axum::http::Extensions;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::error::{AuthError, AuthErrorCode};

/// Redeemed challenge, persisted once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRecord {
    pub token: String,
    pub created: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub challenge: String,
    pub address: String,
    pub signature: String,
}

/// Fields of an authentication attempt to record in the replay ledger.
#[derive(Debug, Clone, Copy)]
pub struct NewAuthentication<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub challenge: &'a str,
    pub address: &'a str,
    pub signature: &'a str,
}

/// Terminal state of the authentication gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationStatus {
    Succeeded,
    Skipped,
    Failed,
}

impl AuthenticationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AuthenticationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped authentication outcome.
///
/// `address` is empty unless `status` is `Succeeded`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authentication {
    pub status: AuthenticationStatus,
    pub address: String,
}

impl Authentication {
    pub fn succeeded(address: impl Into<String>) -> Self {
        Self {
            status: AuthenticationStatus::Succeeded,
            address: address.into(),
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: AuthenticationStatus::Skipped,
            address: String::new(),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: AuthenticationStatus::Failed,
            address: String::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthenticationStatus::Succeeded
    }

    /// Read the outcome attached by the gate.
    ///
    /// Errors instead of defaulting when the gate did not run.
    pub fn get(extensions: &Extensions) -> Result<&Authentication, AuthError> {
        extensions.get::<Authentication>().ok_or_else(|| {
            tracing::error!("Authentication status read before the gate attached it");
            AuthError::new(
                AuthErrorCode::Internal,
                "Authentication status is not available for this request.",
            )
        })
    }
}

impl<S> FromRequestParts<S> for Authentication
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Authentication::get(&parts.extensions).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_fails_when_unset() {
        let extensions = Extensions::new();
        let err = Authentication::get(&extensions).unwrap_err();
        assert_eq!(err.code, AuthErrorCode::Internal);
    }

    #[test]
    fn test_get_returns_attached_status() {
        let mut extensions = Extensions::new();
        extensions.insert(Authentication::succeeded("ab12"));

        let auth = Authentication::get(&extensions).unwrap();
        assert!(auth.is_authenticated());
        assert_eq!(auth.address, "ab12");
    }

    #[test]
    fn test_only_success_carries_address() {
        assert!(Authentication::skipped().address.is_empty());
        assert!(Authentication::failed().address.is_empty());
        assert!(!Authentication::skipped().is_authenticated());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&Authentication::skipped()).unwrap();
        assert_eq!(json, r#"{"status":"skipped","address":""}"#);
    }
}
