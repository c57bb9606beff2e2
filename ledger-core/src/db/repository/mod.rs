//! Repository Module
//!
//! Table-level CRUD as free async functions, one module per domain area.
//! Functions that must participate in an enclosing transaction take
//! `&mut SqliteConnection`; callers pass `&mut *tx` from `pool.begin()`.

// Locations and catalog
pub mod branch;
pub mod item;
pub mod product;

// Ledgers
pub mod idempotency;
pub mod journal;
pub mod stock;

// Orders
pub mod order;
pub mod shift;

// Manufacturing and purchasing
pub mod production;
pub mod purchase;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
