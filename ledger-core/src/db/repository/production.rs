//! Production Order Repository

use super::{RepoError, RepoResult};
use shared::models::{ProductionIngredient, ProductionOrder, ProductionStatus};
use shared::util::now_millis;
use sqlx::SqliteConnection;

const COLUMNS: &str = "id, target_item_id, warehouse_id, quantity_requested, quantity_produced, status, batch_number, yield_variance, created_at, started_at, completed_at, updated_at";

pub async fn insert(
    conn: &mut SqliteConnection,
    target_item_id: i64,
    warehouse_id: i64,
    quantity_requested: f64,
    batch_number: &str,
) -> RepoResult<ProductionOrder> {
    let now = now_millis();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO production_order (target_item_id, warehouse_id, quantity_requested, status, batch_number, created_at, updated_at) VALUES (?, ?, ?, 'PENDING', ?, ?, ?) RETURNING id",
    )
    .bind(target_item_id)
    .bind(warehouse_id)
    .bind(quantity_requested)
    .bind(batch_number)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(ProductionOrder {
        id,
        target_item_id,
        warehouse_id,
        quantity_requested,
        quantity_produced: None,
        status: ProductionStatus::Pending,
        batch_number: batch_number.to_string(),
        yield_variance: None,
        created_at: now,
        started_at: None,
        completed_at: None,
        updated_at: now,
    })
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> RepoResult<Option<ProductionOrder>> {
    let order = sqlx::query_as::<_, ProductionOrder>(&format!(
        "SELECT {COLUMNS} FROM production_order WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn insert_ingredient(
    conn: &mut SqliteConnection,
    production_order_id: i64,
    item_id: i64,
    quantity_planned: f64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO production_ingredient (production_order_id, item_id, quantity_planned) VALUES (?, ?, ?)",
    )
    .bind(production_order_id)
    .bind(item_id)
    .bind(quantity_planned)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn ingredients_for(
    conn: &mut SqliteConnection,
    production_order_id: i64,
) -> RepoResult<Vec<ProductionIngredient>> {
    let ingredients = sqlx::query_as::<_, ProductionIngredient>(
        "SELECT production_order_id, item_id, quantity_planned, quantity_reserved, quantity_actual FROM production_ingredient WHERE production_order_id = ? ORDER BY item_id",
    )
    .bind(production_order_id)
    .fetch_all(conn)
    .await?;
    Ok(ingredients)
}

/// Snapshot the reserved quantity of one ingredient at start.
pub async fn set_reserved(
    conn: &mut SqliteConnection,
    production_order_id: i64,
    item_id: i64,
    quantity_reserved: f64,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE production_ingredient SET quantity_reserved = ? WHERE production_order_id = ? AND item_id = ?",
    )
    .bind(quantity_reserved)
    .bind(production_order_id)
    .bind(item_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Record actual consumption; inserts the row for ingredients consumed
/// beyond the plan.
pub async fn set_actual(
    conn: &mut SqliteConnection,
    production_order_id: i64,
    item_id: i64,
    quantity_actual: f64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO production_ingredient (production_order_id, item_id, quantity_planned, quantity_reserved, quantity_actual) VALUES (?1, ?2, 0, 0, ?3) ON CONFLICT (production_order_id, item_id) DO UPDATE SET quantity_actual = ?3",
    )
    .bind(production_order_id)
    .bind(item_id)
    .bind(quantity_actual)
    .execute(conn)
    .await?;
    Ok(())
}

/// PENDING -> IN_PROGRESS. The status guard in the WHERE clause makes
/// concurrent starts lose cleanly.
pub async fn mark_started(conn: &mut SqliteConnection, id: i64) -> RepoResult<()> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE production_order SET status = 'IN_PROGRESS', started_at = ?1, updated_at = ?1 WHERE id = ?2 AND status = 'PENDING'",
    )
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Production order {id} not found or not PENDING"
        )));
    }
    Ok(())
}

/// IN_PROGRESS -> COMPLETED with yield figures.
pub async fn mark_completed(
    conn: &mut SqliteConnection,
    id: i64,
    quantity_produced: f64,
    yield_variance: f64,
) -> RepoResult<()> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE production_order SET status = 'COMPLETED', quantity_produced = ?1, yield_variance = ?2, completed_at = ?3, updated_at = ?3 WHERE id = ?4 AND status = 'IN_PROGRESS'",
    )
    .bind(quantity_produced)
    .bind(yield_variance)
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Production order {id} not found or not IN_PROGRESS"
        )));
    }
    Ok(())
}

/// PENDING/IN_PROGRESS -> CANCELLED.
pub async fn mark_cancelled(conn: &mut SqliteConnection, id: i64) -> RepoResult<()> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE production_order SET status = 'CANCELLED', updated_at = ?1 WHERE id = ?2 AND status IN ('PENDING', 'IN_PROGRESS')",
    )
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Production order {id} not found or already terminal"
        )));
    }
    Ok(())
}
