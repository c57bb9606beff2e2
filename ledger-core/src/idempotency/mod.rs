//! Idempotency Ledger (幂等声明台账)
//!
//! Makes create/update operations safe to retry. A claim is keyed by
//! (client key, operation scope); the first attempt wins it, stores the
//! outcome on completion, and replays that exact outcome to later retries.
//! A failed attempt clears its claim so the key can be retried.
//!
//! Claim creation happens before the business transaction opens: a crash
//! between claim and commit leaves the claim IN_PROGRESS, which a fresh
//! attempt surfaces as a retryable conflict rather than silently losing
//! the guard.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::core::{LedgerError, LedgerResult};
use crate::db::repository::idempotency as claims;
use shared::util::{canonical_payload_hash, now_millis};

/// Fields stripped from payloads before hashing; they control the retry
/// mechanics and are not part of the request semantics.
pub const CONTROL_FIELDS: &[&str] = &["idempotency_key", "idempotencyKey"];

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    InProgress,
    Completed,
}

/// Durable claim row. Owned exclusively by this module.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdempotencyClaim {
    pub id: i64,
    pub key: String,
    pub scope: String,
    pub request_hash: String,
    pub status: ClaimStatus,
    pub resource_id: Option<String>,
    pub response_status: Option<i64>,
    pub response_body: Option<String>,
    pub expires_at: i64,
    pub created_at: i64,
}

/// Replayed outcome of a completed claim
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub status: u16,
    pub resource_id: Option<String>,
    pub body: serde_json::Value,
}

/// Result of `begin_claim`
#[derive(Debug)]
pub enum ClaimOutcome {
    /// The caller won the claim and must execute the operation.
    New,
    /// A prior identical request already completed; replay its response.
    Replay(StoredResponse),
}

/// Idempotency Ledger service
#[derive(Clone, Debug)]
pub struct IdempotencyLedger {
    pool: SqlitePool,
    ttl_ms: i64,
}

impl IdempotencyLedger {
    pub fn new(pool: SqlitePool, ttl_ms: i64) -> Self {
        Self { pool, ttl_ms }
    }

    /// Canonical request hash: key-sorted JSON with control fields
    /// stripped, so semantically-identical payloads hash identically.
    pub fn payload_hash(payload: &serde_json::Value) -> String {
        canonical_payload_hash(payload, CONTROL_FIELDS)
    }

    /// Resolve a claim for (key, scope).
    ///
    /// - no unexpired claim: insert IN_PROGRESS, return [`ClaimOutcome::New`]
    /// - claim with a different payload hash: `IDEMPOTENCY_PAYLOAD_CONFLICT`
    /// - completed claim with a stored response: replay it
    /// - claim still in progress: `IDEMPOTENCY_IN_PROGRESS`
    pub async fn begin_claim(
        &self,
        key: &str,
        scope: &str,
        payload: &serde_json::Value,
    ) -> LedgerResult<ClaimOutcome> {
        let hash = Self::payload_hash(payload);
        let expires_at = now_millis() + self.ttl_ms;
        let mut conn = self.pool.acquire().await?;

        // Fast path: win the claim outright.
        if claims::try_insert(&mut conn, key, scope, &hash, expires_at).await? {
            tracing::debug!(key, scope, "Idempotency claim created");
            return Ok(ClaimOutcome::New);
        }

        let Some(existing) = claims::find(&mut conn, key, scope).await? else {
            // The holder cleared its claim between our insert and lookup;
            // a concurrent retry is in flight.
            return Err(LedgerError::IdempotencyInProgress);
        };

        if existing.expires_at <= now_millis() {
            // Expired claim: take the row over in place.
            if claims::supersede_expired(&mut conn, key, scope, &hash, expires_at).await? {
                tracing::debug!(key, scope, "Expired idempotency claim superseded");
                return Ok(ClaimOutcome::New);
            }
            return Err(LedgerError::IdempotencyInProgress);
        }

        if existing.request_hash != hash {
            // Same key reused for a different request body is not re-honored.
            return Err(LedgerError::IdempotencyPayloadConflict);
        }

        match (&existing.status, &existing.response_body) {
            (ClaimStatus::Completed, Some(body)) => {
                let body = serde_json::from_str(body)
                    .map_err(|e| LedgerError::Database(format!("Corrupt stored response: {e}")))?;
                tracing::debug!(key, scope, "Replaying stored idempotent response");
                Ok(ClaimOutcome::Replay(StoredResponse {
                    status: existing.response_status.unwrap_or(200) as u16,
                    resource_id: existing.resource_id.clone(),
                    body,
                }))
            }
            // First attempt has not finished yet (concurrent retry).
            _ => Err(LedgerError::IdempotencyInProgress),
        }
    }

    /// Mark the claim COMPLETED, store the response and extend the expiry.
    pub async fn complete_claim(
        &self,
        key: &str,
        scope: &str,
        status: u16,
        resource_id: &str,
        body: &serde_json::Value,
    ) -> LedgerResult<()> {
        let mut conn = self.pool.acquire().await?;
        claims::complete(
            &mut conn,
            key,
            scope,
            status,
            resource_id,
            &body.to_string(),
            now_millis() + self.ttl_ms,
        )
        .await?;
        Ok(())
    }

    /// Clear an IN_PROGRESS claim after a failed attempt so the same key
    /// can be retried.
    pub async fn clear_claim(&self, key: &str, scope: &str) -> LedgerResult<()> {
        let mut conn = self.pool.acquire().await?;
        claims::delete(&mut conn, key, scope).await?;
        Ok(())
    }

    /// Purge expired claims (housekeeping).
    pub async fn purge_expired(&self) -> LedgerResult<u64> {
        let mut conn = self.pool.acquire().await?;
        Ok(claims::purge_expired(&mut conn).await?)
    }
}
