//! Authentication gate and its Axum middleware.
//!
//! Per request:
//! 1. Extract address and signature (basic auth) and the challenge header
//! 2. Match (method, path) against the skip list
//! 3. Validate challenge structure and freshness
//! 4. Verify the signature against the address
//! 5. Reject challenges already in the replay ledger
//! 6. Record the redemption in the replay ledger
//! 7. Attach the outcome and continue
//!
//! Failures in 3, 4, 6 and ledger outages in 5 degrade to `Skipped` on
//! skip-listed routes. Replays never do.

use axum::body::Body;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Method, Request, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::challenge::ChallengeCodec;
use super::error::{AuthError, AuthErrorCode};
use super::ledger::ReplayLedger;
use super::models::{Authentication, AuthenticationStatus, NewAuthentication};
use super::signature::verify_challenge;
use super::skip::SkipList;
use crate::config::AuthConfig;

/// Header carrying the challenge string.
pub const CHALLENGE_HEADER: &str = "Authorization-Challenge";

/// Characters of challenge/signature kept in logs when masking.
const MASK_KEEP: usize = 12;

/// Credentials as presented by the caller. Missing parts are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub address: String,
    pub signature: String,
    pub challenge: String,
}

/// Extract credentials from request headers.
///
/// The address and signature ride in the basic-auth slot as
/// `Basic base64(<address>:<signature>)`.
pub fn extract_credentials(headers: &HeaderMap) -> Credentials {
    let (address, signature) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_auth)
        .unwrap_or_default();

    let challenge = headers
        .get(CHALLENGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_default();

    Credentials {
        address,
        signature,
        challenge,
    }
}

fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Per-request authentication orchestrator.
pub struct AuthGate {
    codec: ChallengeCodec,
    ledger: Arc<dyn ReplayLedger>,
    skip_list: SkipList,
    livemode: bool,
    mask_credentials: bool,
}

impl AuthGate {
    pub fn new(
        codec: ChallengeCodec,
        ledger: Arc<dyn ReplayLedger>,
        skip_list: SkipList,
        livemode: bool,
        mask_credentials: bool,
    ) -> Self {
        Self {
            codec,
            ledger,
            skip_list,
            livemode,
            mask_credentials,
        }
    }

    /// Build the gate from the `auth` config section.
    pub fn from_config(
        config: &AuthConfig,
        livemode: bool,
        ledger: Arc<dyn ReplayLedger>,
    ) -> Result<Self, super::skip::SkipListError> {
        let codec = ChallengeCodec::new(
            config.authority.clone(),
            Duration::from_secs(config.max_age_secs),
            Duration::from_secs(config.max_future_skew_secs),
        );
        let skip_list = SkipList::compile(&config.skip_list)?;
        Ok(Self::new(
            codec,
            ledger,
            skip_list,
            livemode,
            config.mask_credentials,
        ))
    }

    pub fn codec(&self) -> &ChallengeCodec {
        &self.codec
    }

    /// Authenticate a request.
    ///
    /// `Ok` carries `Succeeded` or `Skipped`; `Err` means `Failed`.
    pub async fn authenticate(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<Authentication, AuthError> {
        self.authenticate_at(method, uri, headers, Utc::now()).await
    }

    pub async fn authenticate_at(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<Authentication, AuthError> {
        let credentials = extract_credentials(headers);
        let skip = self.skip_list.matches(method, uri.path());

        match self.redeem(method, uri, &credentials, now).await {
            Ok(()) => {
                let auth = Authentication::succeeded(credentials.address.clone());
                self.log_outcome(auth.status, &credentials, None);
                Ok(auth)
            }
            Err(err) if skip && err.code.is_skippable() => {
                let auth = Authentication::skipped();
                self.log_outcome(auth.status, &credentials, Some(&err));
                Ok(auth)
            }
            Err(err) => {
                self.log_outcome(AuthenticationStatus::Failed, &credentials, Some(&err));
                Err(err)
            }
        }
    }

    async fn redeem(
        &self,
        method: &Method,
        uri: &Uri,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let challenge = self.codec.validate_at(&credentials.challenge, now)?;
        tracing::debug!(
            issued_at = challenge.issued_at(),
            age_secs = now.timestamp() - challenge.issued_at(),
            "Challenge within validity window"
        );

        verify_challenge(&challenge, &credentials.address, &credentials.signature)?;

        // Fast path only: the insert below is what enforces single use.
        if self
            .ledger
            .lookup_by_challenge(challenge.as_str())
            .await?
            .is_some()
        {
            return Err(AuthError::from_code(AuthErrorCode::DuplicateChallenge));
        }

        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());

        self.ledger
            .insert(NewAuthentication {
                method: method.as_str(),
                url,
                challenge: challenge.as_str(),
                address: &credentials.address,
                signature: &credentials.signature,
            })
            .await?;

        Ok(())
    }

    fn log_outcome(
        &self,
        status: AuthenticationStatus,
        credentials: &Credentials,
        err: Option<&AuthError>,
    ) {
        let challenge = self.mask(&credentials.challenge);
        let signature = self.mask(&credentials.signature);
        let reason = err.map(|e| e.code.name()).unwrap_or("");

        match status {
            AuthenticationStatus::Failed => tracing::warn!(
                status = %status,
                livemode = self.livemode,
                address = %credentials.address,
                challenge = %challenge,
                signature = %signature,
                reason = reason,
                "Authentication"
            ),
            _ => tracing::info!(
                status = %status,
                livemode = self.livemode,
                address = %credentials.address,
                challenge = %challenge,
                signature = %signature,
                reason = reason,
                "Authentication"
            ),
        }
    }

    fn mask(&self, value: &str) -> String {
        if !self.mask_credentials || value.chars().count() <= MASK_KEEP {
            return value.to_string();
        }
        let mut masked: String = value.chars().take(MASK_KEEP).collect();
        masked.push('…');
        masked
    }
}

/// Axum middleware running the gate in front of every route.
///
/// On success the `Authentication` is inserted into request extensions. On
/// failure the error response carries `Authentication::failed()` in its
/// extensions.
pub async fn auth_middleware(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone());

    match gate
        .authenticate(request.method(), &uri, request.headers())
        .await
    {
        Ok(auth) => {
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Err(err) => {
            let mut response = err.into_response();
            response.extensions_mut().insert(Authentication::failed());
            response
        }
    }
}
