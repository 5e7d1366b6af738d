// flash_relay/src/error.rs

use thiserror::Error;

/// 中继服务的主要错误类型
///
/// 配置错误在启动阶段出现，进程会记录日志后以非零状态退出；
/// 其余错误在运行期间出现，由调用方记录后继续服务。
#[derive(Error, Debug)]
pub enum AppError {
    #[error("WebSocket 服务错误: {0}")]
    WebSocketService(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}
