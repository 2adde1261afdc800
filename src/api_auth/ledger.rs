//! Replay ledger: every redeemed challenge, keyed by challenge value.
//!
//! Single use is guaranteed by the store's uniqueness on `challenge`, not by
//! the lookup. The lookup is a fast path; a concurrent redemption of the same
//! challenge loses at insert time with `StoreError::UniqueViolation`.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sqlx::PgPool;

use super::models::{AuthenticationRecord, NewAuthentication};
use crate::db::{SafeRow, StoreError, new_token};

const TOKEN_PREFIX: &str = "aut";

#[async_trait]
pub trait ReplayLedger: Send + Sync {
    /// Find the record of a previously redeemed challenge.
    async fn lookup_by_challenge(
        &self,
        challenge: &str,
    ) -> Result<Option<AuthenticationRecord>, StoreError>;

    /// Record a redemption. Fails with `UniqueViolation` if the challenge exists.
    async fn insert(
        &self,
        auth: NewAuthentication<'_>,
    ) -> Result<AuthenticationRecord, StoreError>;
}

/// PostgreSQL-backed ledger over the `authentications` table.
pub struct PgReplayLedger {
    pool: PgPool,
}

impl PgReplayLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<AuthenticationRecord, StoreError> {
        Ok(AuthenticationRecord {
            token: row.require("token")?,
            created: row.require("created")?,
            method: row.require("method")?,
            url: row.require("url")?,
            challenge: row.require("challenge")?,
            address: row.require("address")?,
            signature: row.require("signature")?,
        })
    }
}

#[async_trait]
impl ReplayLedger for PgReplayLedger {
    async fn lookup_by_challenge(
        &self,
        challenge: &str,
    ) -> Result<Option<AuthenticationRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT token, created, method, url, challenge, address, signature
            FROM authentications
            WHERE challenge = $1
            "#,
        )
        .bind(challenge)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn insert(
        &self,
        auth: NewAuthentication<'_>,
    ) -> Result<AuthenticationRecord, StoreError> {
        let record = AuthenticationRecord {
            token: new_token(TOKEN_PREFIX),
            created: Utc::now(),
            method: auth.method.to_string(),
            url: auth.url.to_string(),
            challenge: auth.challenge.to_string(),
            address: auth.address.to_string(),
            signature: auth.signature.to_string(),
        };

        sqlx::query(
            r#"
            INSERT INTO authentications
                (token, created, method, url, challenge, address, signature)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.token)
        .bind(record.created)
        .bind(&record.method)
        .bind(&record.url)
        .bind(&record.challenge)
        .bind(&record.address)
        .bind(&record.signature)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }
}

/// In-memory ledger. The map entry is the uniqueness constraint.
#[derive(Default)]
pub struct MemoryReplayLedger {
    records: DashMap<String, AuthenticationRecord>,
}

impl MemoryReplayLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ReplayLedger for MemoryReplayLedger {
    async fn lookup_by_challenge(
        &self,
        challenge: &str,
    ) -> Result<Option<AuthenticationRecord>, StoreError> {
        Ok(self.records.get(challenge).map(|r| r.value().clone()))
    }

    async fn insert(
        &self,
        auth: NewAuthentication<'_>,
    ) -> Result<AuthenticationRecord, StoreError> {
        match self.records.entry(auth.challenge.to_string()) {
            Entry::Occupied(_) => Err(StoreError::UniqueViolation(format!(
                "authentications.challenge {}",
                auth.challenge
            ))),
            Entry::Vacant(slot) => {
                let record = AuthenticationRecord {
                    token: new_token(TOKEN_PREFIX),
                    created: Utc::now(),
                    method: auth.method.to_string(),
                    url: auth.url.to_string(),
                    challenge: auth.challenge.to_string(),
                    address: auth.address.to_string(),
                    signature: auth.signature.to_string(),
                };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }
}
