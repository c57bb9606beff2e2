//! Domain models
//!
//! Row shapes and input DTOs shared between the engine and its callers.
//! Database derives are gated behind the `db` feature.

pub mod branch;
pub mod inventory;
pub mod journal;
pub mod order;
pub mod product;
pub mod production;
pub mod purchase;
pub mod shift;

// Re-exports
pub use branch::{Branch, Warehouse, WarehouseKind};
pub use inventory::{
    BomComponent, InventoryItem, MovementType, StockAdjust, StockLevel, StockMovement,
    StockTransfer, WasteInput,
};
pub use journal::{JournalEntry, NewJournalEntry};
pub use order::{
    CreateOrderInput, Order, OrderDetail, OrderItem, OrderItemInput, OrderStatus, OrderType,
    PaymentInput, PaymentRecord, StatusHistoryRow,
};
pub use product::{Product, RecipeLine};
pub use production::{
    IngredientConsumption, ProductionIngredient, ProductionOrder, ProductionStatus,
};
pub use purchase::{
    PurchaseItemInput, PurchaseOrder, PurchaseOrderCreate, PurchaseOrderItem, PurchaseStatus,
};
pub use shift::{Shift, ShiftClose, ShiftCreate, ShiftStatus};
