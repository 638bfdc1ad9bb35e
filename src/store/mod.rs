//! Persistence layer.
//!
//! Each store is an `async_trait` with a PostgreSQL implementation and an
//! in-memory implementation so engine semantics are testable without a
//! database. All state transitions go through atomic CAS updates.

pub mod escrow;
#[cfg(feature = "mock-chain")]
pub mod mem;
pub mod schema;
pub mod txlog;
pub mod wallets;
pub mod withdraw;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),

    /// A stored value could not be interpreted (bad id, bad state, ...)
    #[error("corrupt record: {0}")]
    Corrupt(String),
}
