//! Idempotency Claim Repository
//!
//! One row guards one (key, scope) pair via a UNIQUE constraint; racing
//! inserts are resolved with `INSERT OR IGNORE` so exactly one attempt
//! wins the claim.

use super::RepoResult;
use crate::idempotency::IdempotencyClaim;
use shared::util::now_millis;
use sqlx::SqliteConnection;

const COLUMNS: &str = "id, key, scope, request_hash, status, resource_id, response_status, response_body, expires_at, created_at";

pub async fn find(
    conn: &mut SqliteConnection,
    key: &str,
    scope: &str,
) -> RepoResult<Option<IdempotencyClaim>> {
    let claim = sqlx::query_as::<_, IdempotencyClaim>(&format!(
        "SELECT {COLUMNS} FROM idempotency_claim WHERE key = ? AND scope = ?"
    ))
    .bind(key)
    .bind(scope)
    .fetch_optional(conn)
    .await?;
    Ok(claim)
}

/// Attempt to win the claim. Returns false when another attempt holds it.
pub async fn try_insert(
    conn: &mut SqliteConnection,
    key: &str,
    scope: &str,
    request_hash: &str,
    expires_at: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "INSERT OR IGNORE INTO idempotency_claim (key, scope, request_hash, status, expires_at, created_at) VALUES (?, ?, ?, 'IN_PROGRESS', ?, ?)",
    )
    .bind(key)
    .bind(scope)
    .bind(request_hash)
    .bind(expires_at)
    .bind(now_millis())
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Take over an expired claim row in place. The expiry guard in the WHERE
/// clause keeps two racing takeovers from both succeeding.
pub async fn supersede_expired(
    conn: &mut SqliteConnection,
    key: &str,
    scope: &str,
    request_hash: &str,
    expires_at: i64,
) -> RepoResult<bool> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE idempotency_claim SET request_hash = ?, status = 'IN_PROGRESS', resource_id = NULL, response_status = NULL, response_body = NULL, expires_at = ?, created_at = ? WHERE key = ? AND scope = ? AND expires_at <= ?",
    )
    .bind(request_hash)
    .bind(expires_at)
    .bind(now)
    .bind(key)
    .bind(scope)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Store the outcome and extend the expiry.
pub async fn complete(
    conn: &mut SqliteConnection,
    key: &str,
    scope: &str,
    response_status: u16,
    resource_id: &str,
    response_body: &str,
    expires_at: i64,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE idempotency_claim SET status = 'COMPLETED', response_status = ?, resource_id = ?, response_body = ?, expires_at = ? WHERE key = ? AND scope = ?",
    )
    .bind(response_status as i64)
    .bind(resource_id)
    .bind(response_body)
    .bind(expires_at)
    .bind(key)
    .bind(scope)
    .execute(conn)
    .await?;
    Ok(())
}

/// Drop the claim so a failed attempt does not block retries.
pub async fn delete(conn: &mut SqliteConnection, key: &str, scope: &str) -> RepoResult<()> {
    sqlx::query("DELETE FROM idempotency_claim WHERE key = ? AND scope = ? AND status = 'IN_PROGRESS'")
        .bind(key)
        .bind(scope)
        .execute(conn)
        .await?;
    Ok(())
}

/// Housekeeping: purge claims past their expiry.
pub async fn purge_expired(conn: &mut SqliteConnection) -> RepoResult<u64> {
    let rows = sqlx::query("DELETE FROM idempotency_claim WHERE expires_at <= ?")
        .bind(now_millis())
        .execute(conn)
        .await?;
    Ok(rows.rows_affected())
}
