//! Settle - federated mint and register
//!
//! Challenge-authenticated HTTP service: callers prove ownership of an
//! Ed25519 key by signing a single-use challenge, and register users are
//! provisioned onto the mint the first time they are retrieved.
//!
//! # Modules
//!
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL pool, row access helpers, store errors
//! - [`api_auth`] - challenge codec, signature verifier, replay ledger, authentication gate
//! - [`register`] - register users and the provisioning saga
//! - [`mint`] - mint users, amounts and offer status
//! - [`gateway`] - HTTP router, handlers and error envelope

pub mod api_auth;
pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod mint;
pub mod register;

// Convenient re-exports at crate root
pub use api_auth::{AuthGate, Authentication, AuthenticationStatus};
pub use config::AppConfig;
pub use mint::{Amount, OfferStatus};
pub use register::{ProvisionError, UserProvisioner};
