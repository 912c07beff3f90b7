//! Order Server - 订单生命周期服务
//!
//! # 架构概述
//!
//! - **订单** (`orders`): 状态机、redb 存储、延迟送达
//! - **外部服务** (`clients`): 身份验证与支付发起
//! - **HTTP API** (`api`): RESTful 接口
//!
//! # 模块结构
//!
//! ```text
//! order-server/src/
//! ├── core/          # 配置、状态、后台任务、错误
//! ├── api/           # HTTP 路由和处理器
//! ├── clients/       # 身份 / 支付服务客户端
//! ├── orders/        # 订单编排、存储、送达
//! └── utils/         # 日志、校验
//! ```

pub mod api;
pub mod clients;
pub mod core;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use orders::{OrderStorage, OrdersManager};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCode};

pub use utils::logger::init_logger_with_file;

/// 设置运行环境: 加载 .env，初始化日志
///
/// 需在读取 [`Config`] 之前调用，以便 .env 中的变量生效。
pub fn setup_environment() -> Config {
    if let Err(e) = dotenv::dotenv() {
        // .env 是可选的
        eprintln!("No .env loaded: {e}");
    }

    let config = Config::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    config
}

pub fn print_banner() {
    println!(
        r#"
  ____          _
 / __ \_______/ /__ _______
/ /_/ / __/ _  / -_) __(_-<
\____/_/  \_,_/\__/_/ /___/
    "#
    );
}
