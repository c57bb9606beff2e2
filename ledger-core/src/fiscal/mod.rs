//! Fiscal submission sink (异步上报)
//!
//! Paid orders must eventually reach the tax authority's e-invoice
//! gateway. That call is slow and unreliable, so the core only enqueues:
//! a background worker drains the queue and feeds the pluggable
//! [`FiscalSink`]. Submission errors are recorded on the side-effect
//! monitor and never propagate to the order flow.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::observability::{SideEffectKind, SideEffectMonitor};

/// External fiscal gateway contract
#[async_trait]
pub trait FiscalSink: Send + Sync {
    /// Submit one order for fiscalization.
    async fn submit(&self, order_id: &str) -> Result<(), String>;
}

/// Default sink for deployments without a fiscal gateway.
pub struct NullFiscalSink;

#[async_trait]
impl FiscalSink for NullFiscalSink {
    async fn submit(&self, order_id: &str) -> Result<(), String> {
        tracing::debug!(order_id, "Fiscal submission skipped (null sink)");
        Ok(())
    }
}

/// Cheap handle services use to enqueue submissions.
#[derive(Clone, Debug)]
pub struct FiscalQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl FiscalQueue {
    /// Enqueue an order for background submission. Fire-and-forget: a
    /// closed queue is recorded, not surfaced.
    pub fn enqueue(&self, order_id: &str, monitor: &SideEffectMonitor) {
        if self.tx.send(order_id.to_string()).is_err() {
            monitor.record(
                SideEffectKind::FiscalSubmission,
                order_id,
                "fiscal queue closed",
            );
        }
    }
}

/// 后台 Worker：消费队列并调用外部 sink
pub struct FiscalWorker {
    sink: Arc<dyn FiscalSink>,
    monitor: Arc<SideEffectMonitor>,
}

impl FiscalWorker {
    /// Spawn the worker; returns the queue handle.
    pub fn spawn(
        sink: Arc<dyn FiscalSink>,
        monitor: Arc<SideEffectMonitor>,
        shutdown: CancellationToken,
    ) -> FiscalQueue {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = FiscalWorker { sink, monitor };
        tokio::spawn(async move {
            worker.run(rx, shutdown).await;
        });
        FiscalQueue { tx }
    }

    /// 运行 worker（队列关闭或收到关机信号时退出）
    async fn run(self, mut rx: mpsc::UnboundedReceiver<String>, shutdown: CancellationToken) {
        tracing::info!("Fiscal submission worker started");

        loop {
            tokio::select! {
                maybe_order = rx.recv() => {
                    let Some(order_id) = maybe_order else {
                        tracing::info!("Fiscal queue closed, worker stopping");
                        return;
                    };
                    match self.sink.submit(&order_id).await {
                        Ok(()) => {
                            tracing::debug!(order_id = %order_id, "Fiscal submission accepted");
                        }
                        Err(e) => {
                            tracing::warn!(order_id = %order_id, error = %e, "Fiscal submission failed");
                            self.monitor
                                .record(SideEffectKind::FiscalSubmission, order_id, e);
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Fiscal worker received shutdown signal");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingSink {
        submitted: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl FiscalSink for RecordingSink {
        async fn submit(&self, order_id: &str) -> Result<(), String> {
            if self.fail {
                return Err("gateway unavailable".into());
            }
            self.submitted.lock().push(order_id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn worker_drains_queue() {
        let sink = Arc::new(RecordingSink {
            submitted: Mutex::new(Vec::new()),
            fail: false,
        });
        let monitor = Arc::new(SideEffectMonitor::new(8));
        let shutdown = CancellationToken::new();
        let queue = FiscalWorker::spawn(sink.clone(), monitor.clone(), shutdown.clone());

        queue.enqueue("o-1", &monitor);
        queue.enqueue("o-2", &monitor);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(sink.submitted.lock().as_slice(), ["o-1", "o-2"]);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn failures_are_recorded_not_propagated() {
        let sink = Arc::new(RecordingSink {
            submitted: Mutex::new(Vec::new()),
            fail: true,
        });
        let monitor = Arc::new(SideEffectMonitor::new(8));
        let shutdown = CancellationToken::new();
        let queue = FiscalWorker::spawn(sink, monitor.clone(), shutdown.clone());

        queue.enqueue("o-9", &monitor);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(monitor.failure_count(SideEffectKind::FiscalSubmission), 1);
        shutdown.cancel();
    }
}
