//! Shift operations (班次管理)
//!
//! A shift is a branch-scoped cash-register session. Orders bind to the
//! branch's OPEN shift; cash payments bump its expected drawer amount
//! inside the order transaction; closing counts the drawer and records
//! the variance.

use crate::core::{LedgerError, LedgerResult, LedgerState};
use crate::db::repository::shift as shift_repo;
use shared::auth::AuthContext;
use shared::models::{Shift, ShiftClose, ShiftCreate};

/// Shift service
#[derive(Clone, Debug)]
pub struct ShiftService {
    state: LedgerState,
}

impl ShiftService {
    pub fn new(state: LedgerState) -> Self {
        Self { state }
    }

    /// Open a shift for a branch. Only one shift per branch may be open.
    pub async fn open_shift(&self, data: ShiftCreate, ctx: &AuthContext) -> LedgerResult<Shift> {
        if !ctx.can_access_branch(data.branch_id) {
            return Err(LedgerError::ForbiddenBranchScope {
                actor_branch: ctx.branch_id,
                order_branch: data.branch_id,
            });
        }

        let branch_id = data.branch_id;
        let mut conn = self.state.pool.acquire().await?;
        let shift = shift_repo::create(&mut conn, data).await?;

        tracing::info!(shift_id = shift.id, branch_id, "Shift opened");
        self.state.notifications.publish(
            branch_id,
            "shift",
            "opened",
            &shift.id.to_string(),
            Some(&shift),
        );
        Ok(shift)
    }

    /// Close an OPEN shift with cash counting; the variance
    /// (actual - expected) is computed atomically.
    pub async fn close_shift(
        &self,
        shift_id: i64,
        data: ShiftClose,
        ctx: &AuthContext,
    ) -> LedgerResult<Shift> {
        let mut conn = self.state.pool.acquire().await?;

        let shift = shift_repo::find_by_id(&mut conn, shift_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Shift {shift_id} not found")))?;
        if !ctx.can_access_branch(shift.branch_id) {
            return Err(LedgerError::ForbiddenBranchScope {
                actor_branch: ctx.branch_id,
                order_branch: shift.branch_id,
            });
        }

        let closed = shift_repo::close(&mut conn, shift_id, data).await?;

        tracing::info!(
            shift_id,
            branch_id = closed.branch_id,
            cash_variance = ?closed.cash_variance,
            "Shift closed"
        );
        self.state.notifications.publish(
            closed.branch_id,
            "shift",
            "closed",
            &shift_id.to_string(),
            Some(&closed),
        );
        Ok(closed)
    }

    /// The branch's OPEN shift, if any.
    pub async fn find_open(&self, branch_id: i64) -> LedgerResult<Option<Shift>> {
        let mut conn = self.state.pool.acquire().await?;
        Ok(shift_repo::find_open_for_branch(&mut conn, branch_id).await?)
    }
}
