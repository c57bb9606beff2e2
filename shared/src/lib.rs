//! Shared types for the restaurant ledger core
//!
//! Domain models, the unified error-code system and small utilities used
//! by the engine crate. Pure data, no I/O. Database derives
//! (`sqlx::FromRow` / `sqlx::Type`) are gated behind the `db` feature so
//! thin consumers can depend on the models without pulling in sqlx.

pub mod auth;
pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
