/// 核心配置 - 账务引擎的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/ledger | 工作目录 (数据库、日志) |
/// | IDEMPOTENCY_TTL_MS | 86400000 | 幂等声明有效期(毫秒) |
/// | NOTIFY_CHANNEL_CAPACITY | 1024 | 通知总线缓冲容量 |
/// | SIDE_EFFECT_LOG_CAPACITY | 256 | 副作用失败记录上限 |
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库和日志文件
    pub work_dir: String,
    /// Idempotency claim TTL (毫秒)
    pub idempotency_ttl_ms: i64,
    /// Notification bus channel capacity
    pub notify_channel_capacity: usize,
    /// Bounded capacity of the side-effect failure log
    pub side_effect_log_capacity: usize,
}

impl Config {
    /// 从环境变量加载配置，未设置时使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/ledger".into()),
            idempotency_ttl_ms: std::env::var("IDEMPOTENCY_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400_000),
            notify_channel_capacity: std::env::var("NOTIFY_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            side_effect_log_capacity: std::env::var("SIDE_EFFECT_LOG_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
        }
    }

    /// 数据库文件路径
    pub fn database_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.work_dir).join("ledger.db")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: "/var/lib/ledger".into(),
            idempotency_ttl_ms: 86_400_000,
            notify_channel_capacity: 1024,
            side_effect_log_capacity: 256,
        }
    }
}
