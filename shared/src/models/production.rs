//! Production order models (生产工单)
//!
//! A production order converts BOM components into a finished good.
//! Ingredient quantities are snapshotted per phase: planned at creation,
//! reserved at start, actual at completion.

use serde::{Deserialize, Serialize};

/// Production order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ProductionStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl ProductionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProductionStatus::Completed | ProductionStatus::Cancelled
        )
    }
}

/// Production order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ProductionOrder {
    pub id: i64,
    pub target_item_id: i64,
    pub warehouse_id: i64,
    pub quantity_requested: f64,
    pub quantity_produced: Option<f64>,
    pub status: ProductionStatus,
    pub batch_number: String,
    /// produced - requested, set at completion
    pub yield_variance: Option<f64>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
}

/// Per-ingredient snapshot attached to a production order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ProductionIngredient {
    pub production_order_id: i64,
    pub item_id: i64,
    /// BOM quantity x requested quantity, fixed at creation
    pub quantity_planned: f64,
    /// Deducted from stock at start
    pub quantity_reserved: Option<f64>,
    /// Reported at completion; may differ from reserved
    pub quantity_actual: Option<f64>,
}

/// Actual consumption reported when completing a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientConsumption {
    pub item_id: i64,
    pub quantity: f64,
}
