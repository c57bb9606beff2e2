//! Purchase Order Repository

use super::{RepoError, RepoResult};
use shared::models::{PurchaseOrder, PurchaseOrderCreate, PurchaseOrderItem, PurchaseStatus};
use shared::util::now_millis;
use sqlx::SqliteConnection;

pub async fn create(
    conn: &mut SqliteConnection,
    data: &PurchaseOrderCreate,
) -> RepoResult<PurchaseOrder> {
    if data.items.is_empty() {
        return Err(RepoError::Validation(
            "Purchase order requires at least one line".into(),
        ));
    }
    for line in &data.items {
        if line.quantity <= 0.0 {
            return Err(RepoError::Validation(format!(
                "Purchase quantity must be positive for item {}",
                line.item_id
            )));
        }
        if line.unit_cost < 0.0 {
            return Err(RepoError::Validation(format!(
                "Unit cost cannot be negative for item {}",
                line.item_id
            )));
        }
    }

    let now = now_millis();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO purchase_order (supplier_name, warehouse_id, status, created_at) VALUES (?, ?, 'PENDING', ?) RETURNING id",
    )
    .bind(&data.supplier_name)
    .bind(data.warehouse_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    for line in &data.items {
        sqlx::query(
            "INSERT INTO purchase_order_item (purchase_order_id, item_id, quantity, unit_cost) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(line.item_id)
        .bind(line.quantity)
        .bind(line.unit_cost)
        .execute(&mut *conn)
        .await?;
    }

    Ok(PurchaseOrder {
        id,
        supplier_name: data.supplier_name.clone(),
        warehouse_id: data.warehouse_id,
        status: PurchaseStatus::Pending,
        created_at: now,
        received_at: None,
    })
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> RepoResult<Option<PurchaseOrder>> {
    let po = sqlx::query_as::<_, PurchaseOrder>(
        "SELECT id, supplier_name, warehouse_id, status, created_at, received_at FROM purchase_order WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(po)
}

pub async fn items_for(
    conn: &mut SqliteConnection,
    purchase_order_id: i64,
) -> RepoResult<Vec<PurchaseOrderItem>> {
    let items = sqlx::query_as::<_, PurchaseOrderItem>(
        "SELECT purchase_order_id, item_id, quantity, unit_cost FROM purchase_order_item WHERE purchase_order_id = ? ORDER BY item_id",
    )
    .bind(purchase_order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// PENDING -> RECEIVED. Returns false when the PO was already received
/// (replayed receipt).
pub async fn mark_received(conn: &mut SqliteConnection, id: i64) -> RepoResult<bool> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE purchase_order SET status = 'RECEIVED', received_at = ? WHERE id = ? AND status = 'PENDING'",
    )
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() > 0)
}
