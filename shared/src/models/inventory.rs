//! Inventory models (库存台账)
//!
//! Stock rows are a materialized projection of the append-only movement
//! log: the sum of movements touching an (item, warehouse) pair must
//! reconcile to the current `StockLevel.quantity`.

use serde::{Deserialize, Serialize};

/// Inventory item (ingredient or finished good)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub sku: Option<String>,
    /// Stock-keeping unit, e.g. "kg", "pcs"
    pub unit: String,
    /// Unit cost used for financial postings
    pub cost_price: f64,
    /// Whether the item carries a BOM (producible)
    pub is_composite: bool,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One BOM line: producing one unit of `parent_item_id` consumes
/// `quantity` of `component_item_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct BomComponent {
    pub parent_item_id: i64,
    pub component_item_id: i64,
    pub quantity: f64,
}

/// Current quantity of an item in a warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StockLevel {
    pub item_id: i64,
    pub warehouse_id: i64,
    pub quantity: f64,
}

/// Stock movement type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum MovementType {
    /// Absolute quantity overwrite (stocktake correction)
    Adjustment,
    /// Warehouse-to-warehouse move
    Transfer,
    /// Purchase order receipt
    Purchase,
    /// Finished goods added by a production run
    ProductionIn,
    /// Ingredients consumed/reserved by a production run
    ProductionOut,
    /// Spoilage / breakage write-off
    Waste,
    /// Ingredient deduction for a POS sale
    PosSale,
}

/// Append-only movement log row.
///
/// `quantity` is always positive; direction is carried by the optional
/// source/destination warehouses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: i64,
    pub item_id: i64,
    pub from_warehouse_id: Option<i64>,
    pub to_warehouse_id: Option<i64>,
    pub quantity: f64,
    pub movement_type: MovementType,
    pub reason: Option<String>,
    /// Caller-supplied replay guard: a reference that already produced a
    /// movement makes the call a no-op
    pub reference_id: Option<String>,
    pub actor_id: String,
    pub created_at: i64,
}

/// Absolute stock adjustment input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjust {
    pub item_id: i64,
    pub warehouse_id: i64,
    /// New absolute quantity (must be >= 0)
    pub new_quantity: f64,
    pub reason: String,
    pub reference_id: Option<String>,
}

/// Warehouse transfer input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockTransfer {
    pub item_id: i64,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub quantity: f64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
}

/// Waste write-off input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteInput {
    pub item_id: i64,
    pub warehouse_id: i64,
    pub quantity: f64,
    pub reason: String,
    pub reference_id: Option<String>,
}
