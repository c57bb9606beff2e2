//! Shift Model (班次管理)

use serde::{Deserialize, Serialize};

/// Shift status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ShiftStatus {
    #[default]
    Open,
    Closed,
}

/// Shift record - a branch-scoped cash-register session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Shift {
    pub id: i64,
    pub branch_id: i64,
    /// Operator employee ID
    pub operator_id: String,
    /// Operator display name
    pub operator_name: String,
    pub status: ShiftStatus,
    pub start_time: i64,
    /// Null while still open
    pub end_time: Option<i64>,
    /// Cash in the drawer at open
    pub starting_cash: f64,
    /// starting_cash + cash payments received
    pub expected_cash: f64,
    /// Counted at close
    pub actual_cash: Option<f64>,
    /// actual - expected
    pub cash_variance: Option<f64>,
    pub note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Open-shift payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftCreate {
    pub branch_id: i64,
    pub operator_id: String,
    pub operator_name: String,
    #[serde(default)]
    pub starting_cash: f64,
    pub note: Option<String>,
}

/// Close-shift payload (with cash counting)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftClose {
    pub actual_cash: f64,
    pub note: Option<String>,
}
