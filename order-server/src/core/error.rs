use crate::clients::ClientError;
use crate::orders::StorageError;
use thiserror::Error;

/// 服务器启动/运行错误
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("存储初始化失败: {0}")]
    Storage(#[from] StorageError),

    #[error("外部服务客户端初始化失败: {0}")]
    Client(#[from] ClientError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
