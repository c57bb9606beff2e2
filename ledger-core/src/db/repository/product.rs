//! Product Repository
//!
//! Menu items and their ingredient recipes.

use super::RepoResult;
use shared::models::{Product, RecipeLine};
use shared::util::now_millis;
use sqlx::SqliteConnection;

pub async fn create_product(
    conn: &mut SqliteConnection,
    name: &str,
    price: f64,
) -> RepoResult<Product> {
    let now = now_millis();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO product (name, price, is_active, created_at, updated_at) VALUES (?, ?, 1, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(price)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(Product {
        id,
        name: name.to_string(),
        price,
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

pub async fn find_product(
    conn: &mut SqliteConnection,
    id: i64,
) -> RepoResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT id, name, price, is_active, created_at, updated_at FROM product WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

pub async fn set_recipe_line(
    conn: &mut SqliteConnection,
    product_id: i64,
    item_id: i64,
    quantity: f64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO product_recipe (product_id, item_id, quantity) VALUES (?, ?, ?) ON CONFLICT (product_id, item_id) DO UPDATE SET quantity = excluded.quantity",
    )
    .bind(product_id)
    .bind(item_id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn recipe_for(
    conn: &mut SqliteConnection,
    product_id: i64,
) -> RepoResult<Vec<RecipeLine>> {
    let lines = sqlx::query_as::<_, RecipeLine>(
        "SELECT product_id, item_id, quantity FROM product_recipe WHERE product_id = ? ORDER BY item_id",
    )
    .bind(product_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}
