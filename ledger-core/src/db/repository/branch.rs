//! Branch and Warehouse Repository

use super::RepoResult;
use shared::models::{Branch, Warehouse, WarehouseKind};
use shared::util::now_millis;
use sqlx::SqliteConnection;

pub async fn create_branch(conn: &mut SqliteConnection, name: &str) -> RepoResult<Branch> {
    let now = now_millis();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO branch (name, is_active, created_at) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(true)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(Branch {
        id,
        name: name.to_string(),
        is_active: true,
        created_at: now,
    })
}

pub async fn create_warehouse(
    conn: &mut SqliteConnection,
    branch_id: i64,
    name: &str,
    kind: WarehouseKind,
) -> RepoResult<Warehouse> {
    let now = now_millis();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO warehouse (branch_id, name, kind, is_active, created_at) VALUES (?, ?, ?, 1, ?) RETURNING id",
    )
    .bind(branch_id)
    .bind(name)
    .bind(kind)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(Warehouse {
        id,
        branch_id,
        name: name.to_string(),
        kind,
        is_active: true,
        created_at: now,
    })
}

pub async fn find_warehouse(
    conn: &mut SqliteConnection,
    id: i64,
) -> RepoResult<Option<Warehouse>> {
    let warehouse = sqlx::query_as::<_, Warehouse>(
        "SELECT id, branch_id, name, kind, is_active, created_at FROM warehouse WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(warehouse)
}

/// The branch's active kitchen warehouse: the deduction target for POS
/// sales.
pub async fn find_kitchen_warehouse(
    conn: &mut SqliteConnection,
    branch_id: i64,
) -> RepoResult<Option<Warehouse>> {
    let warehouse = sqlx::query_as::<_, Warehouse>(
        "SELECT id, branch_id, name, kind, is_active, created_at FROM warehouse WHERE branch_id = ? AND kind = 'KITCHEN' AND is_active = 1 LIMIT 1",
    )
    .bind(branch_id)
    .fetch_optional(conn)
    .await?;
    Ok(warehouse)
}
