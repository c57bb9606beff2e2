//! Journal Repository
//!
//! Append-only. There is deliberately no update or delete here;
//! corrections are new offsetting entries.

use super::RepoResult;
use shared::models::{JournalEntry, NewJournalEntry};
use shared::util::now_millis;
use sqlx::SqliteConnection;

pub async fn insert(
    conn: &mut SqliteConnection,
    entry: &NewJournalEntry,
) -> RepoResult<JournalEntry> {
    let now = now_millis();
    let metadata = entry.metadata.as_ref().map(|m| m.to_string());

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO journal_entry (description, amount, debit_account, credit_account, reference_id, source, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&entry.description)
    .bind(entry.amount)
    .bind(&entry.debit_account)
    .bind(&entry.credit_account)
    .bind(&entry.reference_id)
    .bind(&entry.source)
    .bind(&metadata)
    .bind(now)
    .fetch_one(conn)
    .await?;

    Ok(JournalEntry {
        id,
        description: entry.description.clone(),
        amount: entry.amount,
        debit_account: entry.debit_account.clone(),
        credit_account: entry.credit_account.clone(),
        reference_id: entry.reference_id.clone(),
        source: entry.source.clone(),
        metadata,
        created_at: now,
    })
}

pub async fn find_by_reference(
    conn: &mut SqliteConnection,
    reference_id: &str,
) -> RepoResult<Vec<JournalEntry>> {
    let entries = sqlx::query_as::<_, JournalEntry>(
        "SELECT id, description, amount, debit_account, credit_account, reference_id, source, metadata, created_at FROM journal_entry WHERE reference_id = ? ORDER BY created_at, id",
    )
    .bind(reference_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}

pub async fn find_by_source(
    conn: &mut SqliteConnection,
    source: &str,
) -> RepoResult<Vec<JournalEntry>> {
    let entries = sqlx::query_as::<_, JournalEntry>(
        "SELECT id, description, amount, debit_account, credit_account, reference_id, source, metadata, created_at FROM journal_entry WHERE source = ? ORDER BY created_at, id",
    )
    .bind(source)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
