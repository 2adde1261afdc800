//! Mint: federation node holding IOUs for its users.
//!
//! ## Components
//! - `amount`: arbitrary-precision amounts
//! - `models`: mint-side user and offer status
//! - `store`: transactional mint store (PostgreSQL)
//! - `memory`: in-memory mint store

pub mod amount;
pub mod memory;
pub mod models;
pub mod store;

pub use amount::{Amount, AmountParseError};
pub use memory::MemoryMintStore;
pub use models::{MintUser, OfferStatus, OfferStatusParseError, PasswordError};
pub use store::{MintStore, MintTx, PgMintStore};
