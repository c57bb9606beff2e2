//! Branch and warehouse models

use serde::{Deserialize, Serialize};

/// Warehouse kind. Each branch keeps one active KITCHEN warehouse that
/// POS sales deduct from; STORAGE warehouses hold bulk stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum WarehouseKind {
    Kitchen,
    Storage,
}

/// Branch (store location)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Branch {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: i64,
}

/// Warehouse scoped to a branch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: i64,
    pub branch_id: i64,
    pub name: String,
    pub kind: WarehouseKind,
    pub is_active: bool,
    pub created_at: i64,
}
