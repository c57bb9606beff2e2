//! Order state machine and transition policy
//!
//! States: PENDING -> PREPARING -> READY -> {OUT_FOR_DELIVERY ->
//! {DELIVERED, COMPLETED}} | DELIVERED | COMPLETED, with CANCELLED
//! reachable from any non-terminal state. DELIVERED, COMPLETED and
//! CANCELLED are terminal.

use crate::core::{LedgerError, LedgerResult};
use shared::auth::AuthContext;
use shared::models::OrderStatus;

/// Legal successor states.
pub fn allowed_successors(status: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match status {
        Pending => &[Preparing, Cancelled],
        Preparing => &[Ready, Cancelled],
        Ready => &[OutForDelivery, Delivered, Completed, Cancelled],
        OutForDelivery => &[Delivered, Completed, Cancelled],
        Delivered | Completed | Cancelled => &[],
    }
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDecision {
    /// current == next: nothing to apply.
    NoOp,
    /// Transition is legal for this actor.
    Apply,
}

/// Evaluate a requested transition against role, branch scope and the
/// transition table.
///
/// Checks in order: no-op, branch scope, transition legality, cancellation
/// gates (manager tier + non-empty reason).
pub fn evaluate(
    current: OrderStatus,
    next: OrderStatus,
    ctx: &AuthContext,
    order_branch: i64,
    note: Option<&str>,
) -> LedgerResult<TransitionDecision> {
    if current == next {
        return Ok(TransitionDecision::NoOp);
    }

    if !ctx.can_access_branch(order_branch) {
        return Err(LedgerError::ForbiddenBranchScope {
            actor_branch: ctx.branch_id,
            order_branch,
        });
    }

    if !allowed_successors(current).contains(&next) {
        return Err(LedgerError::InvalidTransition {
            from: current,
            to: next,
        });
    }

    if next == OrderStatus::Cancelled {
        if !ctx.role.is_manager_tier() {
            return Err(LedgerError::TransitionForbidden(format!(
                "Role {:?} may not cancel orders",
                ctx.role
            )));
        }
        if note.map(str::trim).unwrap_or_default().is_empty() {
            return Err(LedgerError::CancellationReasonRequired);
        }
    }

    Ok(TransitionDecision::Apply)
}
