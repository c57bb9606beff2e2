//! Order models
//!
//! Monetary fields on [`Order`] are derived server-side from line items;
//! client-submitted totals are discarded and recomputed. `updated_at`
//! doubles as the optimistic-concurrency version observed by callers.

use serde::{Deserialize, Serialize};

/// Order channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderType {
    DineIn,
    Delivery,
    Pickup,
    CallCenter,
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }
}

/// Order record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub branch_id: i64,
    /// Dining table (DINE_IN only)
    pub table_id: Option<String>,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// The OPEN shift this order was taken under
    pub shift_id: i64,
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub service_charge: f64,
    pub delivery_fee: f64,
    pub total: f64,
    pub note: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_by: String,
    pub created_at: i64,
    /// Last-modified millis; doubles as the optimistic concurrency version
    pub updated_at: i64,
}

/// Order line item (snapshot of the product at sale time)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: String,
    pub product_id: i64,
    /// Product name snapshot
    pub name: String,
    pub unit_price: f64,
    pub quantity: i32,
    /// Modifier selections, JSON
    pub modifiers: Option<String>,
    pub line_total: f64,
}

/// Payment row.
///
/// `id` is a deterministic synthetic id (`{order_id}:p{n}`) so retried
/// order creations never duplicate payment rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PaymentRecord {
    pub id: String,
    pub order_id: String,
    pub method: String,
    pub amount: f64,
    pub created_at: i64,
}

/// Append-only status transition log row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StatusHistoryRow {
    pub id: i64,
    pub order_id: String,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub actor_id: String,
    pub actor_name: String,
    pub note: Option<String>,
    pub created_at: i64,
}

/// Line item input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub product_id: i64,
    pub quantity: i32,
    /// Unit price override (authorized discounts); defaults to the product
    /// sell price
    pub unit_price: Option<f64>,
    pub modifiers: Option<serde_json::Value>,
}

/// Payment input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    pub method: String,
    pub amount: f64,
}

/// Order creation input.
///
/// Carries no total fields on purpose: totals are always recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderInput {
    pub branch_id: i64,
    pub order_type: OrderType,
    pub table_id: Option<String>,
    pub items: Vec<OrderItemInput>,
    /// Order-level discount amount
    #[serde(default)]
    pub discount: Option<f64>,
    /// Delivery fee (DELIVERY orders)
    #[serde(default)]
    pub delivery_fee: Option<f64>,
    pub note: Option<String>,
    #[serde(default)]
    pub payments: Vec<PaymentInput>,
}

/// Order with owned rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<PaymentRecord>,
}

impl OrderDetail {
    /// Whether payments cover the order total (within a cent).
    pub fn is_fully_paid(&self) -> bool {
        let paid: f64 = self.payments.iter().map(|p| p.amount).sum();
        paid + 0.005 >= self.order.total
    }
}
