//! Financial journal models
//!
//! Journal entries are immutable facts. They reference external ids by
//! value only, never by live foreign key, so they survive even if the
//! referenced order or purchase order is later deleted. Corrections are
//! always new offsetting entries.

use serde::{Deserialize, Serialize};

/// Posted double-entry journal fact (debit amount == credit amount)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct JournalEntry {
    pub id: i64,
    pub description: String,
    pub amount: f64,
    pub debit_account: String,
    pub credit_account: String,
    pub reference_id: Option<String>,
    /// Originating component tag, e.g. "pos-sale", "inventory-adjustment"
    pub source: String,
    /// Free-form JSON
    pub metadata: Option<String>,
    pub created_at: i64,
}

/// Entry to post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub description: String,
    /// Must be > 0; zero/negative postings are skipped upstream
    pub amount: f64,
    pub debit_account: String,
    pub credit_account: String,
    pub reference_id: Option<String>,
    pub source: String,
    pub metadata: Option<serde_json::Value>,
}
