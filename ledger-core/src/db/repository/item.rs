//! Inventory Item Repository
//!
//! Items, and the BOM rows expanded by the production engine.

use super::RepoResult;
use shared::models::{BomComponent, InventoryItem};
use shared::util::now_millis;
use sqlx::SqliteConnection;

pub async fn create_item(
    conn: &mut SqliteConnection,
    name: &str,
    unit: &str,
    cost_price: f64,
    is_composite: bool,
) -> RepoResult<InventoryItem> {
    let now = now_millis();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO inventory_item (name, sku, unit, cost_price, is_composite, is_active, created_at, updated_at) VALUES (?, NULL, ?, ?, ?, 1, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(unit)
    .bind(cost_price)
    .bind(is_composite)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(InventoryItem {
        id,
        name: name.to_string(),
        sku: None,
        unit: unit.to_string(),
        cost_price,
        is_composite,
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

pub async fn find_item(
    conn: &mut SqliteConnection,
    id: i64,
) -> RepoResult<Option<InventoryItem>> {
    let item = sqlx::query_as::<_, InventoryItem>(
        "SELECT id, name, sku, unit, cost_price, is_composite, is_active, created_at, updated_at FROM inventory_item WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(item)
}

/// Replace one BOM line of a composite item.
pub async fn set_bom_component(
    conn: &mut SqliteConnection,
    parent_item_id: i64,
    component_item_id: i64,
    quantity: f64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO bom_component (parent_item_id, component_item_id, quantity) VALUES (?, ?, ?) ON CONFLICT (parent_item_id, component_item_id) DO UPDATE SET quantity = excluded.quantity",
    )
    .bind(parent_item_id)
    .bind(component_item_id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn bom_for(
    conn: &mut SqliteConnection,
    parent_item_id: i64,
) -> RepoResult<Vec<BomComponent>> {
    let components = sqlx::query_as::<_, BomComponent>(
        "SELECT parent_item_id, component_item_id, quantity FROM bom_component WHERE parent_item_id = ? ORDER BY component_item_id",
    )
    .bind(parent_item_id)
    .fetch_all(conn)
    .await?;
    Ok(components)
}
