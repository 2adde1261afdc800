//! Challenge codec.
//!
//! A challenge is the string `<authority>.<issued_at>.<entropy>`:
//! - `authority`: identifier of the issuing mint (may itself contain dots)
//! - `issued_at`: unix timestamp in seconds
//! - `entropy`: 16 random bytes, hex encoded
//!
//! The string is the canonical form: callers sign its UTF-8 bytes as-is and
//! the replay ledger compares it byte for byte.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use std::time::Duration;

use super::error::{AuthError, AuthErrorCode};

/// Upper bound on the encoded length of a challenge.
pub const MAX_CHALLENGE_LEN: usize = 256;

const ENTROPY_BYTES: usize = 16;

/// A structurally valid, fresh challenge.
///
/// Only produced by [`ChallengeCodec::issue`] or [`ChallengeCodec::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Challenge {
    value: String,
    issued_at: i64,
}

impl Challenge {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Bytes the caller signs.
    pub fn signing_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }

    /// Embedded issuance time (unix seconds).
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Issues and validates challenges for one authority.
#[derive(Debug, Clone)]
pub struct ChallengeCodec {
    authority: String,
    max_age_secs: i64,
    max_future_skew_secs: i64,
}

impl ChallengeCodec {
    pub fn new(authority: impl Into<String>, max_age: Duration, max_future_skew: Duration) -> Self {
        Self {
            authority: authority.into(),
            max_age_secs: i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX),
            max_future_skew_secs: i64::try_from(max_future_skew.as_secs()).unwrap_or(i64::MAX),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Issue a fresh challenge stamped with the current time.
    pub fn issue(&self) -> Challenge {
        self.issue_at(Utc::now())
    }

    pub fn issue_at(&self, now: DateTime<Utc>) -> Challenge {
        let mut entropy = [0u8; ENTROPY_BYTES];
        OsRng.fill_bytes(&mut entropy);
        let issued_at = now.timestamp();
        Challenge {
            value: format!("{}.{}.{}", self.authority, issued_at, hex::encode(entropy)),
            issued_at,
        }
    }

    /// Check structure and freshness against the current time.
    pub fn validate(&self, raw: &str) -> Result<Challenge, AuthError> {
        self.validate_at(raw, Utc::now())
    }

    pub fn validate_at(&self, raw: &str, now: DateTime<Utc>) -> Result<Challenge, AuthError> {
        let issued_at = self.parse(raw)?;
        let now = now.timestamp();

        if issued_at.saturating_sub(now) > self.max_future_skew_secs {
            return Err(AuthError::new(
                AuthErrorCode::Expired,
                format!(
                    "The challenge you provided is not valid yet (issued at {}, server time {}).",
                    issued_at, now
                ),
            ));
        }
        if now.saturating_sub(issued_at) > self.max_age_secs {
            return Err(AuthError::new(
                AuthErrorCode::Expired,
                format!(
                    "The challenge you provided has expired (issued at {}, valid for {}s).",
                    issued_at, self.max_age_secs
                ),
            ));
        }

        Ok(Challenge {
            value: raw.to_string(),
            issued_at,
        })
    }

    fn parse(&self, raw: &str) -> Result<i64, AuthError> {
        let malformed = |reason: &str| {
            AuthError::new(
                AuthErrorCode::Malformed,
                format!("The challenge you provided is not well formed: {}.", reason),
            )
        };

        if raw.is_empty() {
            return Err(malformed("missing Authorization-Challenge header"));
        }
        if raw.len() > MAX_CHALLENGE_LEN {
            return Err(malformed("too long"));
        }

        // Split from the right: the authority may contain dots.
        let mut parts = raw.rsplitn(3, '.');
        let (Some(entropy), Some(timestamp), Some(authority)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected <authority>.<timestamp>.<entropy>"));
        };

        if authority.is_empty()
            || !authority
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b':'))
        {
            return Err(malformed("invalid authority"));
        }
        if authority != self.authority {
            return Err(malformed("issued by another authority"));
        }
        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("invalid timestamp"));
        }
        if entropy.is_empty()
            || !entropy
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'))
        {
            return Err(malformed("invalid entropy"));
        }

        timestamp
            .parse::<i64>()
            .map_err(|_| malformed("timestamp out of range"))
    }
}
