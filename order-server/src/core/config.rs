use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 支付流程形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    /// Fire-and-forget: 创建订单后异步投递支付消息，结果由支付服务回调 confirm/cancel
    Async,
    /// Request/response: 创建订单时同步等待支付结果
    Sync,
}

impl FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "async" => Ok(PaymentMode::Async),
            "sync" => Ok(PaymentMode::Sync),
            other => Err(format!("unknown payment mode: {other}")),
        }
    }
}

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/orders | 工作目录 (数据库、日志) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | AUTH_SERVICE_URL | http://localhost:3001 | 身份服务地址 |
/// | PAYMENT_SERVICE_URL | http://localhost:3002 | 支付服务地址 |
/// | PAYMENT_MODE | async | async \| sync |
/// | DELIVERY_DELAY_SECS | 5 | 确认后到送达的延迟(秒) |
/// | REQUEST_TIMEOUT_MS | 10000 | 外部服务请求超时(毫秒) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | - | 日志目录 (存在时写入滚动日志文件) |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/orders PAYMENT_MODE=sync cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    pub auth_service_url: String,
    pub payment_service_url: String,
    pub payment_mode: PaymentMode,
    pub delivery_delay_secs: u64,
    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/orders".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            auth_service_url: std::env::var("AUTH_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3001".into()),
            payment_service_url: std::env::var("PAYMENT_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3002".into()),
            payment_mode: std::env::var("PAYMENT_MODE")
                .ok()
                .and_then(|m| m.parse().ok())
                .unwrap_or(PaymentMode::Async),
            delivery_delay_secs: std::env::var("DELIVERY_DELAY_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// redb 数据库文件
    pub fn database_path(&self) -> PathBuf {
        self.database_dir().join("orders.redb")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())
    }

    pub fn delivery_delay(&self) -> Duration {
        Duration::from_secs(self.delivery_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
