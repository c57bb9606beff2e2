//! Branch-scoped notification bus
//!
//! In-process publish-only fan-out: ledger services announce committed
//! changes, interested parties (websocket gateways, printers, kitchen
//! displays, all outside this crate) subscribe. Fire-and-forget with no
//! delivery guarantee; the core never blocks on it and never fails
//! because of it.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// 资源版本管理器
///
/// 每种资源类型维护独立的单调递增版本号，订阅方据此判断数据新旧。
#[derive(Debug, Default)]
pub struct ResourceVersions {
    versions: DashMap<String, u64>,
}

impl ResourceVersions {
    pub fn new() -> Self {
        Self {
            versions: DashMap::new(),
        }
    }

    /// 递增指定资源的版本号并返回新值
    pub fn increment(&self, resource: &str) -> u64 {
        let mut entry = self.versions.entry(resource.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn get(&self, resource: &str) -> u64 {
        self.versions.get(resource).map(|v| *v).unwrap_or(0)
    }
}

/// Broadcast payload for one committed change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPayload {
    /// Branch the event belongs to (subscribers filter on it)
    pub branch_id: i64,
    /// Resource type, e.g. "order", "stock", "production_order"
    pub resource: String,
    /// Monotonic per-resource version
    pub version: u64,
    /// Change kind: "created", "updated", "status_changed", ...
    pub action: String,
    /// Resource ID
    pub id: String,
    pub data: Option<serde_json::Value>,
}

/// Publish-only notification bus
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<SyncPayload>,
    versions: Arc<ResourceVersions>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            versions: Arc::new(ResourceVersions::new()),
        }
    }

    /// Publish a branch-scoped event. Never fails: a send error only means
    /// there are no subscribers right now.
    pub fn publish<T: Serialize>(
        &self,
        branch_id: i64,
        resource: &str,
        action: &str,
        id: &str,
        data: Option<&T>,
    ) {
        let version = self.versions.increment(resource);
        let payload = SyncPayload {
            branch_id,
            resource: resource.to_string(),
            version,
            action: action.to_string(),
            id: id.to_string(),
            data: data.and_then(|d| serde_json::to_value(d).ok()),
        };
        if self.tx.send(payload).is_err() {
            tracing::trace!(resource, action, "No notification subscribers");
        }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncPayload> {
        self.tx.subscribe()
    }
}
