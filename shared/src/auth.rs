//! Authenticated actor context
//!
//! Supplied by the (out-of-scope) authentication layer; the core treats it
//! as trusted input already validated upstream.

use serde::{Deserialize, Serialize};

/// Actor role tiers.
///
/// `Admin` is the super-admin-equivalent role: it may act across branches.
/// `Admin` and `Manager` form the manager tier gating sensitive operations
/// such as order cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Staff,
}

impl Role {
    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn is_manager_tier(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

/// Trusted actor context attached to every ledger-mutating call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Employee ID
    pub user_id: String,
    /// Display name (snapshotted into audit rows)
    pub name: String,
    /// Role tier
    pub role: Role,
    /// Home branch
    pub branch_id: i64,
}

impl AuthContext {
    /// Whether this actor may touch resources of `branch_id`.
    pub fn can_access_branch(&self, branch_id: i64) -> bool {
        self.role.is_super_admin() || self.branch_id == branch_id
    }
}
