//! Side-effect failure monitor
//!
//! Post-commit side effects (journal posting, notifications, fiscal
//! submission) are best-effort: their failures must never surface to the
//! caller or roll back a committed transaction. Instead of silently
//! swallowing them, every failure is recorded here: a bounded queue of
//! recent failures plus per-channel counters that operators can inspect.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use shared::util::now_millis;

/// Which best-effort channel failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffectKind {
    FinancePosting,
    Notification,
    FiscalSubmission,
}

/// One recorded failure
#[derive(Debug, Clone)]
pub struct SideEffectFailure {
    pub kind: SideEffectKind,
    /// Business reference, e.g. an order id
    pub reference: String,
    pub error: String,
    pub at: i64,
}

/// Bounded failure log + counters, shared behind an `Arc`.
#[derive(Debug)]
pub struct SideEffectMonitor {
    recent: Mutex<VecDeque<SideEffectFailure>>,
    capacity: usize,
    finance_failures: AtomicU64,
    notify_failures: AtomicU64,
    fiscal_failures: AtomicU64,
}

impl SideEffectMonitor {
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            finance_failures: AtomicU64::new(0),
            notify_failures: AtomicU64::new(0),
            fiscal_failures: AtomicU64::new(0),
        }
    }

    /// Record a failure; evicts the oldest entry when full.
    pub fn record(&self, kind: SideEffectKind, reference: impl Into<String>, error: impl Into<String>) {
        let counter = match kind {
            SideEffectKind::FinancePosting => &self.finance_failures,
            SideEffectKind::Notification => &self.notify_failures,
            SideEffectKind::FiscalSubmission => &self.fiscal_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let failure = SideEffectFailure {
            kind,
            reference: reference.into(),
            error: error.into(),
            at: now_millis(),
        };

        let mut recent = self.recent.lock();
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(failure);
    }

    /// Snapshot of recent failures, oldest first.
    pub fn recent_failures(&self) -> Vec<SideEffectFailure> {
        self.recent.lock().iter().cloned().collect()
    }

    pub fn failure_count(&self, kind: SideEffectKind) -> u64 {
        match kind {
            SideEffectKind::FinancePosting => self.finance_failures.load(Ordering::Relaxed),
            SideEffectKind::Notification => self.notify_failures.load(Ordering::Relaxed),
            SideEffectKind::FiscalSubmission => self.fiscal_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_queue_evicts_oldest() {
        let monitor = SideEffectMonitor::new(2);
        monitor.record(SideEffectKind::Notification, "a", "boom");
        monitor.record(SideEffectKind::Notification, "b", "boom");
        monitor.record(SideEffectKind::Notification, "c", "boom");

        let recent = monitor.recent_failures();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].reference, "b");
        assert_eq!(recent[1].reference, "c");
        assert_eq!(monitor.failure_count(SideEffectKind::Notification), 3);
    }
}
