//! 引擎状态 - 持有所有共享服务的单例引用
//!
//! [`LedgerState`] 使用 Arc/浅拷贝共享，所有权成本极低。服务组件
//! (订单、库存、生产) 各自持有一份克隆。

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::core::{Config, LedgerError, LedgerResult};
use crate::db::DbService;
use crate::finance::FinanceService;
use crate::fiscal::{FiscalQueue, FiscalSink, FiscalWorker, NullFiscalSink};
use crate::idempotency::IdempotencyLedger;
use crate::notify::NotificationBus;
use crate::observability::{SideEffectKind, SideEffectMonitor};
use shared::models::NewJournalEntry;

/// Shared engine state
#[derive(Clone, Debug)]
pub struct LedgerState {
    /// 引擎配置
    pub config: Config,
    /// SQLite 连接池
    pub pool: SqlitePool,
    /// 通知总线 (fire-and-forget)
    pub notifications: NotificationBus,
    /// 副作用失败监控
    pub monitor: Arc<SideEffectMonitor>,
    /// 税务上报队列
    fiscal: FiscalQueue,
    /// 后台任务关机信号
    shutdown: CancellationToken,
}

impl LedgerState {
    /// Initialize with the default (null) fiscal sink.
    pub async fn initialize(config: Config) -> LedgerResult<Self> {
        Self::initialize_with_sink(config, Arc::new(NullFiscalSink)).await
    }

    /// Initialize state: work dir, database, notification bus, fiscal
    /// worker.
    pub async fn initialize_with_sink(
        config: Config,
        fiscal_sink: Arc<dyn FiscalSink>,
    ) -> LedgerResult<Self> {
        std::fs::create_dir_all(&config.work_dir)
            .map_err(|e| LedgerError::Database(format!("Failed to create work dir: {e}")))?;

        let db_path = config.database_path();
        let db = DbService::new(&db_path.to_string_lossy()).await?;

        Self::with_pool(config, db.pool, fiscal_sink)
    }

    /// Build state around an existing pool (tests open their own tempfile
    /// database first).
    pub fn with_pool(
        config: Config,
        pool: SqlitePool,
        fiscal_sink: Arc<dyn FiscalSink>,
    ) -> LedgerResult<Self> {
        let notifications = NotificationBus::new(config.notify_channel_capacity);
        let monitor = Arc::new(SideEffectMonitor::new(config.side_effect_log_capacity));
        let shutdown = CancellationToken::new();
        let fiscal = FiscalWorker::spawn(fiscal_sink, monitor.clone(), shutdown.clone());

        Ok(Self {
            config,
            pool,
            notifications,
            monitor,
            fiscal,
            shutdown,
        })
    }

    /// Financial posting engine bound to this state.
    pub fn finance(&self) -> FinanceService {
        FinanceService::new(self.pool.clone())
    }

    /// Idempotency ledger bound to this state.
    pub fn idempotency(&self) -> IdempotencyLedger {
        IdempotencyLedger::new(self.pool.clone(), self.config.idempotency_ttl_ms)
    }

    /// Post a journal entry strictly after a committed transaction.
    /// Best-effort: failures are logged and counted, never propagated and
    /// never rolled back against.
    pub async fn post_journal(&self, entry: NewJournalEntry) {
        let reference = entry.reference_id.clone().unwrap_or_default();
        if let Err(e) = self.finance().post_double_entry(entry).await {
            tracing::warn!(reference = %reference, error = %e, "Post-commit journal posting failed");
            self.monitor
                .record(SideEffectKind::FinancePosting, reference, e.to_string());
        }
    }

    /// Queue a paid order for background fiscal submission.
    pub fn enqueue_fiscal(&self, order_id: &str) {
        self.fiscal.enqueue(order_id, &self.monitor);
    }

    /// Stop background workers.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
