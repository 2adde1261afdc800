//! Challenge-based request authentication.
//!
//! Callers fetch a single-use challenge, sign it with the Ed25519 key whose
//! public half is their address, and present address, signature and challenge
//! on the next request. Each challenge can be redeemed once.
//!
//! ## Components
//! - `challenge`: challenge codec (structure + freshness)
//! - `signature`: Ed25519 verification against the claimed address
//! - `ledger`: replay ledger of redeemed challenges
//! - `skip`: routes where failures degrade to `Skipped`
//! - `models`: authentication record and request-scoped status
//! - `middleware`: the gate and its Axum middleware
//! - `error`: authentication error codes

pub mod challenge;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod signature;
pub mod skip;

// Re-export for convenience
pub use challenge::{Challenge, ChallengeCodec};
pub use error::{AuthError, AuthErrorCode};
pub use ledger::{MemoryReplayLedger, PgReplayLedger, ReplayLedger};
pub use middleware::{AuthGate, CHALLENGE_HEADER, Credentials, auth_middleware, extract_credentials};
pub use models::{Authentication, AuthenticationRecord, AuthenticationStatus, NewAuthentication};
pub use signature::{decode_address, encode_address, verify_challenge};
pub use skip::{SkipList, SkipListError, SkipRuleConfig, default_skip_rules};
