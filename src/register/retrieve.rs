//! User retrieval and first-time provisioning.
//!
//! Retrieval verifies the register-side user and, the first time it runs for
//! a user, creates (or reconciles) the matching mint-side user. The two
//! stores commit independently, mint first. A failure between the two commits
//! leaves a mint user without a back-reference on the register side; the next
//! retrieval finds that mint user and adopts it instead of creating another.

use serde::Serialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{error, info};
use utoipa::ToSchema;

use super::error::ProvisionError;
use super::models::{CredentialsResource, RegisterUser, UserResource, UserStatus};
use super::store::{RegisterStore, RegisterTx};
use super::validation::Username;
use crate::mint::{MintStore, MintUser};

/// Successful retrieval payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RetrievedUser {
    pub user: UserResource,
    pub credentials: CredentialsResource,
}

pub struct UserProvisioner {
    register: Arc<dyn RegisterStore>,
    mint: Arc<dyn MintStore>,
    mint_identity: String,
}

impl UserProvisioner {
    pub fn new(
        register: Arc<dyn RegisterStore>,
        mint: Arc<dyn MintStore>,
        mint_identity: impl Into<String>,
    ) -> Self {
        Self {
            register,
            mint,
            mint_identity: mint_identity.into(),
        }
    }

    /// Retrieve a user by username and secret, provisioning it on first use.
    pub async fn retrieve(
        &self,
        username: &Username,
        secret: &str,
    ) -> Result<RetrievedUser, ProvisionError> {
        let mut reg_tx = self.register.begin().await?;

        info!(username = %username, "User retrieval");

        let mut user = reg_tx
            .load_user_by_username(username.as_str())
            .await?
            .ok_or(ProvisionError::NotFound)?;

        if !secret_matches(&user.secret, secret) {
            return Err(ProvisionError::CredentialMismatch);
        }

        if user.needs_provisioning() {
            if !user.is_verified() {
                user.status = UserStatus::Verified;
                reg_tx.save_user(&user).await?;
                info!(
                    token = %user.token,
                    username = %user.username,
                    status = %user.status,
                    "Updated user"
                );
            }

            if user.mint_token.is_none() {
                self.provision_mint_user(reg_tx.as_mut(), &mut user).await?;
            }
        }

        reg_tx.commit().await?;

        Ok(RetrievedUser {
            user: UserResource::from(&user),
            credentials: CredentialsResource::new(&user, &self.mint_identity),
        })
    }

    /// Create or reconcile the mint user, record its token on `user` within
    /// the register transaction, then commit the mint transaction.
    async fn provision_mint_user(
        &self,
        reg_tx: &mut dyn RegisterTx,
        user: &mut RegisterUser,
    ) -> Result<(), ProvisionError> {
        let mut mint_tx = self.mint.begin().await?;

        let mint_user = match mint_tx.load_user_by_username(&user.username).await? {
            Some(mut existing) => {
                existing
                    .update_password(&user.password)
                    .map_err(|e| ProvisionError::Internal(e.to_string()))?;
                mint_tx.save_user(&existing).await?;
                info!(
                    token = %existing.token,
                    username = %existing.username,
                    "Updated mint user"
                );
                existing
            }
            None => {
                let created = match MintUser::new(&user.username, &user.password) {
                    Ok(created) => created,
                    Err(e) => return Err(unrecoverable(&user.username, e.to_string())),
                };
                if let Err(e) = mint_tx.create_user(&created).await {
                    return Err(unrecoverable(&user.username, e.to_string()));
                }
                info!(
                    token = %created.token,
                    username = %created.username,
                    "Created mint user"
                );
                created
            }
        };

        user.mint_token = Some(mint_user.token);
        reg_tx.save_user(user).await?;

        mint_tx.commit().await?;
        Ok(())
    }
}

fn unrecoverable(username: &str, reason: String) -> ProvisionError {
    error!(username = %username, reason = %reason, "Mint user creation failed");
    ProvisionError::Unrecoverable {
        username: username.to_string(),
        reason,
    }
}

fn secret_matches(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mint::MemoryMintStore;
    use crate::register::memory::MemoryRegisterStore;

    const MINT: &str = "mint.example.com";

    struct Fixture {
        register: MemoryRegisterStore,
        mint: MemoryMintStore,
        provisioner: UserProvisioner,
    }

    fn fixture() -> Fixture {
        let register = MemoryRegisterStore::new();
        let mint = MemoryMintStore::new();
        let provisioner = UserProvisioner::new(
            Arc::new(register.clone()),
            Arc::new(mint.clone()),
            MINT,
        );
        Fixture {
            register,
            mint,
            provisioner,
        }
    }

    fn seed(f: &Fixture, name: &str) -> RegisterUser {
        let user = RegisterUser::new(name, &format!("{}@example.com", name));
        f.register.insert(user.clone());
        user
    }

    fn name(s: &str) -> Username {
        Username::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_first_retrieval_provisions() {
        let f = fixture();
        let seeded = seed(&f, "alice");

        let out = f.provisioner.retrieve(&name("alice"), &seeded.secret).await.unwrap();
        assert_eq!(out.user.status, UserStatus::Verified);
        assert_eq!(out.credentials.address, "alice@mint.example.com");
        assert_eq!(out.credentials.password, seeded.password);

        let reg = f.register.get("alice").unwrap();
        let mint = f.mint.get("alice").unwrap();
        assert!(reg.is_verified());
        assert_eq!(reg.mint_token.as_deref(), Some(mint.token.as_str()));
        assert!(mint.verify_password(&seeded.password));
        assert_eq!(f.mint.create_calls(), 1);
    }

    /// Mint store that cannot open a transaction.
    struct UnreachableMint;

    #[async_trait::async_trait]
    impl MintStore for UnreachableMint {
        async fn begin(&self) -> Result<Box<dyn crate::mint::MintTx>, crate::db::StoreError> {
            Err(crate::db::StoreError::Unavailable("mint down".into()))
        }
    }

    #[tokio::test]
    async fn test_provisioned_user_skips_mint_store() {
        let f = fixture();
        let seeded = seed(&f, "gina");
        f.provisioner.retrieve(&name("gina"), &seeded.secret).await.unwrap();

        let provisioner =
            UserProvisioner::new(Arc::new(f.register.clone()), Arc::new(UnreachableMint), MINT);
        let out = provisioner.retrieve(&name("gina"), &seeded.secret).await.unwrap();
        assert_eq!(out.user.status, UserStatus::Verified);

        let fresh = seed(&f, "hank");
        assert!(matches!(
            provisioner.retrieve(&name("hank"), &fresh.secret).await,
            Err(ProvisionError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_retrieval_is_idempotent() {
        let f = fixture();
        let seeded = seed(&f, "alice");

        f.provisioner.retrieve(&name("alice"), &seeded.secret).await.unwrap();
        let token = f.register.get("alice").unwrap().mint_token;

        let again = f.provisioner.retrieve(&name("alice"), &seeded.secret).await.unwrap();
        assert_eq!(again.user.status, UserStatus::Verified);
        assert_eq!(f.register.get("alice").unwrap().mint_token, token);
        assert_eq!(f.mint.create_calls(), 1);
        assert_eq!(f.mint.len(), 1);
    }

    #[tokio::test]
    async fn test_reconciles_existing_mint_user() {
        let f = fixture();
        let seeded = seed(&f, "bob");
        let orphan = MintUser::new("bob", "stale-password").unwrap();
        f.mint.insert(orphan.clone());

        f.provisioner.retrieve(&name("bob"), &seeded.secret).await.unwrap();

        let mint = f.mint.get("bob").unwrap();
        assert_eq!(mint.token, orphan.token);
        assert!(mint.verify_password(&seeded.password));
        assert!(!mint.verify_password("stale-password"));
        assert_eq!(
            f.register.get("bob").unwrap().mint_token.as_deref(),
            Some(orphan.token.as_str())
        );
        assert_eq!(f.mint.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_verified_user_missing_mint_token() {
        let f = fixture();
        let mut user = RegisterUser::new("carol", "c@example.com");
        user.status = UserStatus::Verified;
        f.register.insert(user.clone());

        f.provisioner.retrieve(&name("carol"), &user.secret).await.unwrap();
        assert!(f.register.get("carol").unwrap().mint_token.is_some());
        assert_eq!(f.mint.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_secret() {
        let f = fixture();
        let seeded = seed(&f, "dave");

        let err = f.provisioner.retrieve(&name("nobody"), "x").await.unwrap_err();
        assert!(matches!(err, ProvisionError::NotFound));

        let err = f.provisioner.retrieve(&name("dave"), "wrong").await.unwrap_err();
        assert!(matches!(err, ProvisionError::CredentialMismatch));
        assert_eq!(err.code(), "user_not_found");

        // Prefix of the real secret is still a mismatch
        let err = f
            .provisioner
            .retrieve(&name("dave"), &seeded.secret[..4])
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::CredentialMismatch));

        let untouched = f.register.get("dave").unwrap();
        assert!(!untouched.is_verified());
        assert!(f.mint.is_empty());
    }

    #[tokio::test]
    async fn test_mint_create_failure_is_unrecoverable() {
        let f = fixture();
        let seeded = seed(&f, "erin");
        f.mint.set_fail_create(true);

        let err = f.provisioner.retrieve(&name("erin"), &seeded.secret).await.unwrap_err();
        assert!(err.is_unrecoverable());

        // Register transaction rolled back: still unverified, no token
        let reg = f.register.get("erin").unwrap();
        assert!(!reg.is_verified());
        assert!(reg.mint_token.is_none());
        assert!(f.mint.is_empty());
    }

    #[tokio::test]
    async fn test_partial_commit_recovered_on_retry() {
        let f = fixture();
        let seeded = seed(&f, "frank");

        // Mint commits, register commit fails
        f.register.set_fail_commit(true);
        let err = f.provisioner.retrieve(&name("frank"), &seeded.secret).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Store(_)));

        let orphan = f.mint.get("frank").unwrap();
        assert!(f.register.get("frank").unwrap().mint_token.is_none());

        f.register.set_fail_commit(false);
        f.provisioner.retrieve(&name("frank"), &seeded.secret).await.unwrap();

        assert_eq!(
            f.register.get("frank").unwrap().mint_token.as_deref(),
            Some(orphan.token.as_str())
        );
        assert_eq!(f.mint.create_calls(), 1);
        assert_eq!(f.mint.len(), 1);
    }

    #[test]
    fn test_secret_matches() {
        assert!(secret_matches("abc", "abc"));
        assert!(!secret_matches("abc", "abd"));
        assert!(!secret_matches("abc", "ab"));
        assert!(!secret_matches("", "a"));
    }
}
