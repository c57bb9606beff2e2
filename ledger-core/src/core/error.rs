//! 统一错误处理
//!
//! [`LedgerError`] is the caller-facing error of every service operation.
//! Repository errors and raw sqlx errors are folded into it; each variant
//! maps onto one stable [`ErrorCode`].

use shared::error::ErrorCode;
use shared::models::OrderStatus;

use crate::db::repository::RepoError;

/// Service-layer error for all ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    // ========== Validation (no side effects) ==========
    #[error("Validation failed: {0}")]
    Validation(String),

    // ========== Policy (no side effects) ==========
    #[error("Actor of branch {actor_branch} cannot modify orders of branch {order_branch}")]
    ForbiddenBranchScope { actor_branch: i64, order_branch: i64 },

    #[error("Status transition forbidden: {0}")]
    TransitionForbidden(String),

    #[error("Cancellation requires a non-empty reason")]
    CancellationReasonRequired,

    // ========== Conflict ==========
    #[error("Order was modified concurrently (current version {current})")]
    VersionConflict { current: i64 },

    #[error("Idempotency key reused with a different payload")]
    IdempotencyPayloadConflict,

    #[error("A request with this idempotency key is still in progress")]
    IdempotencyInProgress,

    // ========== Resource state (transaction rolled back) ==========
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("No open shift for branch {branch_id}")]
    ShiftRequired { branch_id: i64 },

    #[error(
        "Insufficient stock for item {item_id} in warehouse {warehouse_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        item_id: i64,
        warehouse_id: i64,
        available: f64,
        requested: f64,
    },

    #[error("Invalid status transition {from:?} -> {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Wrong lifecycle state: {0}")]
    WrongState(String),

    // ========== Infrastructure ==========
    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    /// Stable error code for the boundary layer.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::ForbiddenBranchScope { .. } => ErrorCode::ForbiddenBranchScope,
            Self::TransitionForbidden(_) => ErrorCode::StatusTransitionForbidden,
            Self::CancellationReasonRequired => ErrorCode::CancellationReasonRequired,
            Self::VersionConflict { .. } => ErrorCode::OrderVersionConflict,
            Self::IdempotencyPayloadConflict => ErrorCode::IdempotencyPayloadConflict,
            Self::IdempotencyInProgress => ErrorCode::IdempotencyInProgress,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::ShiftRequired { .. } => ErrorCode::ShiftRequired,
            Self::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStatusTransition,
            Self::WrongState(_) => ErrorCode::WrongLifecycleState,
            Self::Database(_) => ErrorCode::InternalError,
        }
    }
}

impl From<RepoError> for LedgerError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => LedgerError::NotFound(msg),
            RepoError::Duplicate(msg) => LedgerError::WrongState(msg),
            RepoError::Validation(msg) => LedgerError::Validation(msg),
            RepoError::Database(msg) => LedgerError::Database(msg),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
