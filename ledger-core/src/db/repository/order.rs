//! Order Repository
//!
//! Row-level operations; lifecycle rules live in `orders::service`.
//! Status updates are guarded by `updated_at` so concurrent writers lose
//! cleanly instead of silently overwriting each other.

use super::{RepoError, RepoResult};
use shared::models::{Order, OrderItem, OrderStatus, PaymentRecord, StatusHistoryRow};
use shared::util::now_millis;
use sqlx::SqliteConnection;

const ORDER_COLUMNS: &str = "id, branch_id, table_id, order_type, status, shift_id, subtotal, discount, tax, service_charge, delivery_fee, total, note, cancel_reason, created_by, created_at, updated_at";

pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO orders (id, branch_id, table_id, order_type, status, shift_id, subtotal, discount, tax, service_charge, delivery_fee, total, note, cancel_reason, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id)
    .bind(order.branch_id)
    .bind(&order.table_id)
    .bind(order.order_type)
    .bind(order.status)
    .bind(order.shift_id)
    .bind(order.subtotal)
    .bind(order.discount)
    .bind(order.tax)
    .bind(order.service_charge)
    .bind(order.delivery_fee)
    .bind(order.total)
    .bind(&order.note)
    .bind(&order.cancel_reason)
    .bind(&order.created_by)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> RepoResult<Option<Order>> {
    let order =
        sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(order)
}

/// Insert a line item and return its row id.
pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> RepoResult<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO order_item (order_id, product_id, name, unit_price, quantity, modifiers, line_total) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&item.order_id)
    .bind(item.product_id)
    .bind(&item.name)
    .bind(item.unit_price)
    .bind(item.quantity)
    .bind(&item.modifiers)
    .bind(item.line_total)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn items_for(conn: &mut SqliteConnection, order_id: &str) -> RepoResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, name, unit_price, quantity, modifiers, line_total FROM order_item WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Insert a payment row; replays with the same deterministic id are
/// ignored.
pub async fn insert_payment(
    conn: &mut SqliteConnection,
    payment: &PaymentRecord,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "INSERT OR IGNORE INTO payment (id, order_id, method, amount, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&payment.id)
    .bind(&payment.order_id)
    .bind(&payment.method)
    .bind(payment.amount)
    .bind(payment.created_at)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() > 0)
}

pub async fn payments_for(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> RepoResult<Vec<PaymentRecord>> {
    let payments = sqlx::query_as::<_, PaymentRecord>(
        "SELECT id, order_id, method, amount, created_at FROM payment WHERE order_id = ? ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(payments)
}

/// Append one status-history row.
pub async fn insert_status_history(
    conn: &mut SqliteConnection,
    order_id: &str,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    actor_id: &str,
    actor_name: &str,
    note: Option<&str>,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO order_status_history (order_id, from_status, to_status, actor_id, actor_name, note, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(from_status)
    .bind(to_status)
    .bind(actor_id)
    .bind(actor_name)
    .bind(note)
    .bind(now_millis())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn status_history_for(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> RepoResult<Vec<StatusHistoryRow>> {
    let rows = sqlx::query_as::<_, StatusHistoryRow>(
        "SELECT id, order_id, from_status, to_status, actor_id, actor_name, note, created_at FROM order_status_history WHERE order_id = ? ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Conditional status update: fails (0 rows) when someone else updated
/// the order since `expected_updated_at`.
pub async fn update_status(
    conn: &mut SqliteConnection,
    order_id: &str,
    status: OrderStatus,
    cancel_reason: Option<&str>,
    expected_updated_at: i64,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE orders SET status = ?, cancel_reason = COALESCE(?, cancel_reason), updated_at = ? WHERE id = ? AND updated_at = ?",
    )
    .bind(status)
    .bind(cancel_reason)
    .bind(now)
    .bind(order_id)
    .bind(expected_updated_at)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Move an order to another table.
pub async fn update_table(
    conn: &mut SqliteConnection,
    order_id: &str,
    table_id: &str,
    now: i64,
) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE orders SET table_id = ?, updated_at = ? WHERE id = ?")
        .bind(table_id)
        .bind(now)
        .bind(order_id)
        .execute(conn)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Order {order_id} not found")));
    }
    Ok(())
}

/// Overwrite derived monetary fields (split/merge re-derivation).
pub async fn update_totals(
    conn: &mut SqliteConnection,
    order_id: &str,
    subtotal: f64,
    discount: f64,
    tax: f64,
    service_charge: f64,
    delivery_fee: f64,
    total: f64,
    now: i64,
) -> RepoResult<()> {
    let rows = sqlx::query(
        "UPDATE orders SET subtotal = ?, discount = ?, tax = ?, service_charge = ?, delivery_fee = ?, total = ?, updated_at = ? WHERE id = ?",
    )
    .bind(subtotal)
    .bind(discount)
    .bind(tax)
    .bind(service_charge)
    .bind(delivery_fee)
    .bind(total)
    .bind(now)
    .bind(order_id)
    .execute(conn)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Order {order_id} not found")));
    }
    Ok(())
}

/// Reassign selected item rows to another order (split/merge).
pub async fn move_items(
    conn: &mut SqliteConnection,
    from_order_id: &str,
    to_order_id: &str,
    item_ids: &[i64],
) -> RepoResult<u64> {
    if item_ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; item_ids.len()].join(", ");
    let sql = format!(
        "UPDATE order_item SET order_id = ? WHERE order_id = ? AND id IN ({placeholders})"
    );
    let mut query = sqlx::query(&sql).bind(to_order_id).bind(from_order_id);
    for id in item_ids {
        query = query.bind(id);
    }
    let rows = query.execute(conn).await?;
    Ok(rows.rows_affected())
}

/// Reassign every item of an order (merge).
pub async fn move_all_items(
    conn: &mut SqliteConnection,
    from_order_id: &str,
    to_order_id: &str,
) -> RepoResult<u64> {
    let rows = sqlx::query("UPDATE order_item SET order_id = ? WHERE order_id = ?")
        .bind(to_order_id)
        .bind(from_order_id)
        .execute(conn)
        .await?;
    Ok(rows.rows_affected())
}

/// Reassign every payment of an order (merge).
pub async fn move_all_payments(
    conn: &mut SqliteConnection,
    from_order_id: &str,
    to_order_id: &str,
) -> RepoResult<u64> {
    let rows = sqlx::query("UPDATE payment SET order_id = ? WHERE order_id = ?")
        .bind(to_order_id)
        .bind(from_order_id)
        .execute(conn)
        .await?;
    Ok(rows.rows_affected())
}
