//! Core Module
//!
//! Configuration, the shared engine state and the unified error type.

pub mod config;
pub mod error;
pub mod state;

pub use config::Config;
pub use error::{LedgerError, LedgerResult};
pub use state::LedgerState;
