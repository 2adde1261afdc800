//! Data models for the register store

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::db::new_token;

const TOKEN_PREFIX: &str = "reg";
const SECRET_BYTES: usize = 16;

/// Register-side user status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Unverified,
    Verified,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Unverified => "unverified",
            UserStatus::Verified => "verified",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(UserStatus::Unverified),
            "verified" => Ok(UserStatus::Verified),
            other => Err(format!("unknown user status {:?}", other)),
        }
    }
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Register-side user.
///
/// `mint_token` is a weak back-reference to the mint-side user; nothing
/// enforces it across stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterUser {
    pub token: String,
    pub created: DateTime<Utc>,
    pub username: String,
    pub email: String,
    pub secret: String,
    pub password: String,
    pub status: UserStatus,
    pub mint_token: Option<String>,
}

impl RegisterUser {
    /// Fresh unverified user with generated secret and password.
    pub fn new(username: &str, email: &str) -> Self {
        Self {
            token: new_token(TOKEN_PREFIX),
            created: Utc::now(),
            username: username.to_string(),
            email: email.to_string(),
            secret: random_hex(SECRET_BYTES),
            password: random_hex(SECRET_BYTES),
            status: UserStatus::Unverified,
            mint_token: None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == UserStatus::Verified
    }

    /// Whether the user still needs any provisioning work.
    pub fn needs_provisioning(&self) -> bool {
        !self.is_verified() || self.mint_token.is_none()
    }
}

/// Wire-safe user representation. Never carries secret, password or mint token.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserResource {
    pub id: String,
    /// Unix milliseconds
    pub created: i64,
    pub username: String,
    pub status: UserStatus,
}

impl From<&RegisterUser> for UserResource {
    fn from(user: &RegisterUser) -> Self {
        Self {
            id: user.token.clone(),
            created: user.created.timestamp_millis(),
            username: user.username.clone(),
            status: user.status,
        }
    }
}

/// One-time credentials returned on retrieval.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct CredentialsResource {
    /// `username@mint`
    pub address: String,
    pub password: String,
}

impl CredentialsResource {
    pub fn new(user: &RegisterUser, mint_identity: &str) -> Self {
        Self {
            address: format!("{}@{}", user.username, mint_identity),
            password: user.password.clone(),
        }
    }
}
