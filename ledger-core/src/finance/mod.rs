//! Financial Posting Engine
//!
//! A pure double-entry ledger sink: every posted fact has equal debit and
//! credit amounts, enforced by construction. This component knows nothing
//! about orders, inventory or production; callers arrive with pre-mapped
//! chart-of-accounts codes. Posted entries are never updated or deleted;
//! corrections are new offsetting entries.

use sqlx::SqlitePool;

use crate::core::{LedgerError, LedgerResult};
use crate::db::repository::journal;
use shared::models::{JournalEntry, NewJournalEntry};

/// Chart-of-accounts codes used by the ledger components.
pub mod accounts {
    /// Cash / receivable
    pub const CASH: &str = "1110";
    /// Raw-material inventory asset
    pub const INVENTORY: &str = "1210";
    /// Finished-goods inventory asset
    pub const FINISHED_GOODS: &str = "1220";
    /// Accounts payable
    pub const ACCOUNTS_PAYABLE: &str = "2100";
    /// Sales revenue
    pub const REVENUE: &str = "4100";
    /// Cost of goods sold
    pub const COGS: &str = "5110";
    /// Production waste expense
    pub const PRODUCTION_WASTE: &str = "5120";
}

/// Financial posting service
#[derive(Clone, Debug)]
pub struct FinanceService {
    pool: SqlitePool,
}

impl FinanceService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one balanced journal fact.
    ///
    /// The amount must be strictly positive; callers filter zero and
    /// negative amounts upstream and simply skip the posting.
    pub async fn post_double_entry(&self, entry: NewJournalEntry) -> LedgerResult<JournalEntry> {
        if !entry.amount.is_finite() || entry.amount <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "Journal amount must be positive, got {}",
                entry.amount
            )));
        }
        if entry.debit_account == entry.credit_account {
            return Err(LedgerError::Validation(format!(
                "Debit and credit account must differ, got {}",
                entry.debit_account
            )));
        }

        let mut conn = self.pool.acquire().await?;
        let posted = journal::insert(&mut conn, &entry).await?;
        tracing::debug!(
            entry_id = posted.id,
            amount = posted.amount,
            debit = %posted.debit_account,
            credit = %posted.credit_account,
            source = %posted.source,
            "Journal entry posted"
        );
        Ok(posted)
    }

    /// Entries referencing a business id (order, PO, production run).
    pub async fn entries_for_reference(&self, reference_id: &str) -> LedgerResult<Vec<JournalEntry>> {
        let mut conn = self.pool.acquire().await?;
        Ok(journal::find_by_reference(&mut conn, reference_id).await?)
    }

    /// Entries posted by one originating component.
    pub async fn entries_for_source(&self, source: &str) -> LedgerResult<Vec<JournalEntry>> {
        let mut conn = self.pool.acquire().await?;
        Ok(journal::find_by_source(&mut conn, source).await?)
    }
}
