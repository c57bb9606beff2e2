//! Shift Repository

use super::{RepoError, RepoResult};
use shared::models::{Shift, ShiftClose, ShiftCreate};
use shared::util::now_millis;
use sqlx::SqliteConnection;

const COLUMNS: &str = "id, branch_id, operator_id, operator_name, status, start_time, end_time, starting_cash, expected_cash, actual_cash, cash_variance, note, created_at, updated_at";

fn validate_cash_amount(amount: f64, field_name: &str) -> RepoResult<()> {
    if amount < 0.0 {
        return Err(RepoError::Validation(format!(
            "{field_name} cannot be negative: {amount}"
        )));
    }
    Ok(())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>(&format!("SELECT {COLUMNS} FROM shift WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(shift)
}

/// The branch's OPEN shift, if any. One shift per branch may be open at a
/// time.
pub async fn find_open_for_branch(
    conn: &mut SqliteConnection,
    branch_id: i64,
) -> RepoResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>(&format!(
        "SELECT {COLUMNS} FROM shift WHERE branch_id = ? AND status = 'OPEN' LIMIT 1"
    ))
    .bind(branch_id)
    .fetch_optional(conn)
    .await?;
    Ok(shift)
}

pub async fn create(conn: &mut SqliteConnection, data: ShiftCreate) -> RepoResult<Shift> {
    validate_cash_amount(data.starting_cash, "Starting cash")?;

    // One OPEN shift per branch at a time
    if find_open_for_branch(conn, data.branch_id).await?.is_some() {
        return Err(RepoError::Duplicate(format!(
            "Branch {} already has an open shift",
            data.branch_id
        )));
    }

    let now = now_millis();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO shift (branch_id, operator_id, operator_name, status, start_time, starting_cash, expected_cash, note, created_at, updated_at) VALUES (?, ?, ?, 'OPEN', ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(data.branch_id)
    .bind(&data.operator_id)
    .bind(&data.operator_name)
    .bind(now)
    .bind(data.starting_cash)
    .bind(data.starting_cash)
    .bind(&data.note)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create shift".into()))
}

/// Close with cash counting. Variance is computed in SQL so the update is
/// atomic against concurrent cash payments.
pub async fn close(conn: &mut SqliteConnection, id: i64, data: ShiftClose) -> RepoResult<Shift> {
    validate_cash_amount(data.actual_cash, "Actual cash")?;
    let now = now_millis();

    let rows = sqlx::query(
        "UPDATE shift SET status = 'CLOSED', end_time = ?1, actual_cash = ?2, cash_variance = (?2 - expected_cash), note = COALESCE(?3, note), updated_at = ?1 WHERE id = ?4 AND status = 'OPEN'",
    )
    .bind(now)
    .bind(data.actual_cash)
    .bind(&data.note)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Shift {id} not found or already closed"
        )));
    }
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Shift {id} not found")))
}

/// Bump expected cash for a cash payment taken during the shift.
pub async fn add_cash_payment(
    conn: &mut SqliteConnection,
    shift_id: i64,
    amount: f64,
) -> RepoResult<()> {
    let now = now_millis();
    sqlx::query(
        "UPDATE shift SET expected_cash = expected_cash + ?1, updated_at = ?2 WHERE id = ?3 AND status = 'OPEN'",
    )
    .bind(amount)
    .bind(now)
    .bind(shift_id)
    .execute(conn)
    .await?;
    Ok(())
}
