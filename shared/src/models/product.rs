//! Product (menu item) models

use serde::{Deserialize, Serialize};

/// Sellable menu item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Unit sell price
    pub price: f64,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Per-unit ingredient requirement of a product.
///
/// Order creation expands each sold line item through these rows to
/// deduct ingredients from the branch kitchen warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct RecipeLine {
    pub product_id: i64,
    pub item_id: i64,
    /// Ingredient quantity consumed per unit sold
    pub quantity: f64,
}
