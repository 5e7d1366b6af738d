// flash_feed_client/src/error.rs

use thiserror::Error;

/// 订阅客户端的错误类型
#[derive(Error, Debug)]
pub enum FeedClientError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("客户端服务已停止")]
    ServiceStopped,
}
