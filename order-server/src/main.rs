use anyhow::Context;
use order_server::{Server, print_banner, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 日志) 并加载配置
    let config = setup_environment();

    print_banner();

    tracing::info!(
        environment = %config.environment,
        work_dir = %config.work_dir,
        "Order server starting..."
    );

    // 2. 启动 HTTP 服务器 (Server::run 会初始化状态并启动后台任务)
    let server = Server::new(config);
    server.run().await.context("Server error")?;

    Ok(())
}
