//! Register: onboarding and credential issuance.
//!
//! ## Components
//! - `models`: register-side user and its wire resources
//! - `validation`: username validation
//! - `store`: transactional register store (PostgreSQL)
//! - `memory`: in-memory register store
//! - `retrieve`: user retrieval and mint provisioning
//! - `error`: provisioning errors

pub mod error;
pub mod memory;
pub mod models;
pub mod retrieve;
pub mod store;
pub mod validation;

pub use error::ProvisionError;
pub use memory::MemoryRegisterStore;
pub use models::{CredentialsResource, RegisterUser, UserResource, UserStatus};
pub use retrieve::{RetrievedUser, UserProvisioner};
pub use store::{PgRegisterStore, RegisterStore, RegisterTx};
pub use validation::{Username, ValidationError};
