//! Stock Repository
//!
//! The materialized stock projection and the append-only movement log.
//! Mutations here always run inside the caller's transaction so that the
//! projection and the log move together.

use super::RepoResult;
use shared::models::{MovementType, StockLevel, StockMovement};
use shared::util::now_millis;
use sqlx::SqliteConnection;

/// Movement to append
#[derive(Debug, Clone)]
pub struct NewMovement<'a> {
    pub item_id: i64,
    pub from_warehouse_id: Option<i64>,
    pub to_warehouse_id: Option<i64>,
    pub quantity: f64,
    pub movement_type: MovementType,
    pub reason: Option<&'a str>,
    pub reference_id: Option<&'a str>,
    pub actor_id: &'a str,
}

/// Current quantity of an item in a warehouse (0 when no row exists).
pub async fn quantity(
    conn: &mut SqliteConnection,
    item_id: i64,
    warehouse_id: i64,
) -> RepoResult<f64> {
    let qty: Option<f64> = sqlx::query_scalar(
        "SELECT quantity FROM inventory_stock WHERE item_id = ? AND warehouse_id = ?",
    )
    .bind(item_id)
    .bind(warehouse_id)
    .fetch_optional(conn)
    .await?;
    Ok(qty.unwrap_or(0.0))
}

pub async fn level(
    conn: &mut SqliteConnection,
    item_id: i64,
    warehouse_id: i64,
) -> RepoResult<StockLevel> {
    let qty = quantity(conn, item_id, warehouse_id).await?;
    Ok(StockLevel {
        item_id,
        warehouse_id,
        quantity: qty,
    })
}

/// Overwrite the absolute quantity, creating the row if missing.
pub async fn set_quantity(
    conn: &mut SqliteConnection,
    item_id: i64,
    warehouse_id: i64,
    quantity: f64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO inventory_stock (item_id, warehouse_id, quantity) VALUES (?, ?, ?) ON CONFLICT (item_id, warehouse_id) DO UPDATE SET quantity = excluded.quantity",
    )
    .bind(item_id)
    .bind(warehouse_id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(())
}

/// Add a (possibly negative) delta, creating the row if missing.
pub async fn add_quantity(
    conn: &mut SqliteConnection,
    item_id: i64,
    warehouse_id: i64,
    delta: f64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO inventory_stock (item_id, warehouse_id, quantity) VALUES (?, ?, ?) ON CONFLICT (item_id, warehouse_id) DO UPDATE SET quantity = quantity + excluded.quantity",
    )
    .bind(item_id)
    .bind(warehouse_id)
    .bind(delta)
    .execute(conn)
    .await?;
    Ok(())
}

/// Append one movement row.
pub async fn insert_movement(
    conn: &mut SqliteConnection,
    movement: NewMovement<'_>,
) -> RepoResult<i64> {
    let now = now_millis();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO stock_movement (item_id, from_warehouse_id, to_warehouse_id, quantity, movement_type, reason, reference_id, actor_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(movement.item_id)
    .bind(movement.from_warehouse_id)
    .bind(movement.to_warehouse_id)
    .bind(movement.quantity)
    .bind(movement.movement_type)
    .bind(movement.reason)
    .bind(movement.reference_id)
    .bind(movement.actor_id)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Replay guard: whether `reference_id` already produced a movement of
/// this type.
pub async fn movement_exists(
    conn: &mut SqliteConnection,
    reference_id: &str,
    movement_type: MovementType,
) -> RepoResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM stock_movement WHERE reference_id = ? AND movement_type = ?",
    )
    .bind(reference_id)
    .bind(movement_type)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

pub async fn movements_for_item(
    conn: &mut SqliteConnection,
    item_id: i64,
) -> RepoResult<Vec<StockMovement>> {
    let movements = sqlx::query_as::<_, StockMovement>(
        "SELECT id, item_id, from_warehouse_id, to_warehouse_id, quantity, movement_type, reason, reference_id, actor_id, created_at FROM stock_movement WHERE item_id = ? ORDER BY created_at, id",
    )
    .bind(item_id)
    .fetch_all(conn)
    .await?;
    Ok(movements)
}
