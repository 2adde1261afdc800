//! Mint store: transactional access to mint-side users.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::models::MintUser;
use crate::db::{SafeRow, StoreError};

/// Entry point to the mint store. Every operation runs inside a transaction.
#[async_trait]
pub trait MintStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn MintTx>, StoreError>;
}

/// Open mint-store transaction. Dropping it without `commit` rolls back.
#[async_trait]
pub trait MintTx: Send {
    async fn load_user_by_username(&mut self, username: &str)
    -> Result<Option<MintUser>, StoreError>;

    /// Persist changes to an existing user.
    async fn save_user(&mut self, user: &MintUser) -> Result<(), StoreError>;

    /// Insert a new user. Fails with `UniqueViolation` if the username is taken.
    async fn create_user(&mut self, user: &MintUser) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// PostgreSQL mint store over the `users` table.
pub struct PgMintStore {
    pool: PgPool,
}

impl PgMintStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MintStore for PgMintStore {
    async fn begin(&self) -> Result<Box<dyn MintTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgMintTx { tx: Some(tx) }))
    }
}

pub struct PgMintTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgMintTx {
    fn conn(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Unavailable("mint transaction already closed".to_string()))
    }

    fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<MintUser, StoreError> {
        Ok(MintUser {
            token: row.require("token")?,
            created: row.require("created")?,
            username: row.require("username")?,
            password_hash: row.require("password_hash")?,
        })
    }
}

#[async_trait]
impl MintTx for PgMintTx {
    async fn load_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<MintUser>, StoreError> {
        let tx = self.conn()?;
        let row = sqlx::query(
            r#"
            SELECT token, created, username, password_hash
            FROM users
            WHERE username = $1
            FOR UPDATE
            "#,
        )
        .bind(username)
        .fetch_optional(&mut **tx)
        .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn save_user(&mut self, user: &MintUser) -> Result<(), StoreError> {
        let tx = self.conn()?;
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, password_hash = $3
            WHERE token = $1
            "#,
        )
        .bind(&user.token)
        .bind(&user.username)
        .bind(&user.password_hash)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!(
                "mint user {} vanished during update",
                user.token
            )));
        }
        Ok(())
    }

    async fn create_user(&mut self, user: &MintUser) -> Result<(), StoreError> {
        let tx = self.conn()?;
        sqlx::query(
            r#"
            INSERT INTO users (token, created, username, password_hash)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&user.token)
        .bind(user.created)
        .bind(&user.username)
        .bind(&user.password_hash)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(StoreError::Unavailable(
                "mint transaction already closed".to_string(),
            )),
        }
    }
}

impl Drop for PgMintTx {
    fn drop(&mut self) {
        // sqlx rolls the inner transaction back when it is dropped
        if self.tx.is_some() {
            debug!("Mint transaction dropped without commit, rolling back");
        }
    }
}
