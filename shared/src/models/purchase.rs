//! Purchase order models

use serde::{Deserialize, Serialize};

/// Purchase order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PurchaseStatus {
    Pending,
    Received,
    Cancelled,
}

/// Purchase order header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PurchaseOrder {
    pub id: i64,
    pub supplier_name: String,
    /// Destination warehouse for the receipt
    pub warehouse_id: i64,
    pub status: PurchaseStatus,
    pub created_at: i64,
    pub received_at: Option<i64>,
}

/// Purchase order line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PurchaseOrderItem {
    pub purchase_order_id: i64,
    pub item_id: i64,
    pub quantity: f64,
    pub unit_cost: f64,
}

/// Purchase order line input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseItemInput {
    pub item_id: i64,
    pub quantity: f64,
    pub unit_cost: f64,
}

/// Purchase order creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderCreate {
    pub supplier_name: String,
    pub warehouse_id: i64,
    pub items: Vec<PurchaseItemInput>,
}
