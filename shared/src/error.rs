//! Unified error-code system
//!
//! Every caller-visible failure in the ledger core maps onto one
//! [`ErrorCode`]. Codes are stable strings (SCREAMING_SNAKE_CASE) that
//! upper layers can translate; the numeric status mirrors the HTTP status
//! the boundary would use, without depending on an HTTP stack here.
//!
//! # 错误分类
//!
//! | 分类 | 说明 |
//! |------|------|
//! | validation | 请求字段缺失/非法，未产生任何副作用 |
//! | policy | 越权转换、跨门店操作、缺少取消原因 |
//! | conflict | 版本冲突、幂等键冲突 |
//! | resource-state | 库存不足、状态机拒绝、资源不存在 |
//! | infrastructure | 存储故障，整体回滚 |

use serde::{Deserialize, Serialize};

/// Stable error codes for the ledger core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========== Validation ==========
    ValidationFailed,

    // ========== Policy ==========
    ForbiddenBranchScope,
    StatusTransitionForbidden,
    CancellationReasonRequired,

    // ========== Conflict ==========
    OrderVersionConflict,
    IdempotencyPayloadConflict,
    IdempotencyInProgress,

    // ========== Resource state ==========
    NotFound,
    ShiftRequired,
    InsufficientStock,
    InvalidStatusTransition,
    WrongLifecycleState,

    // ========== Infrastructure ==========
    InternalError,
}

impl ErrorCode {
    /// Stable string form, e.g. `INSUFFICIENT_STOCK`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::ForbiddenBranchScope => "FORBIDDEN_BRANCH_SCOPE",
            Self::StatusTransitionForbidden => "STATUS_TRANSITION_FORBIDDEN",
            Self::CancellationReasonRequired => "CANCELLATION_REASON_REQUIRED",
            Self::OrderVersionConflict => "ORDER_VERSION_CONFLICT",
            Self::IdempotencyPayloadConflict => "IDEMPOTENCY_PAYLOAD_CONFLICT",
            Self::IdempotencyInProgress => "IDEMPOTENCY_IN_PROGRESS",
            Self::NotFound => "NOT_FOUND",
            Self::ShiftRequired => "SHIFT_REQUIRED",
            Self::InsufficientStock => "INSUFFICIENT_STOCK",
            Self::InvalidStatusTransition => "INVALID_STATUS_TRANSITION",
            Self::WrongLifecycleState => "WRONG_LIFECYCLE_STATE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Status the boundary layer would answer with (HTTP semantics).
    pub fn status(&self) -> u16 {
        match self {
            Self::ValidationFailed => 400,
            Self::ForbiddenBranchScope | Self::StatusTransitionForbidden => 403,
            Self::CancellationReasonRequired => 400,
            Self::OrderVersionConflict
            | Self::IdempotencyPayloadConflict
            | Self::IdempotencyInProgress => 409,
            Self::NotFound => 404,
            Self::ShiftRequired
            | Self::InsufficientStock
            | Self::InvalidStatusTransition
            | Self::WrongLifecycleState => 422,
            Self::InternalError => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
