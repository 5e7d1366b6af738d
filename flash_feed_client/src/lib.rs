//! `flash_feed_client` 快讯中继订阅客户端。
//!
//! 连接到 `flash_relay`，把收到的 `flash` / `flash_impact` 合并成一个有序、有上限的快讯列表，
//! 并在断线后按指数退避自动重连。
//!
//! 主要模块包括：
//! - `config`: 连接配置。
//! - `error`: 错误类型 `FeedClientError`。
//! - `news_feed`: 快讯列表与合并规则。
//! - `reconnect`: 指数退避重连策略。
//! - `service`: 后台连接任务与事件通道。
//! - `tail`: `flash_tail` 命令行工具的输出格式。

pub mod config;
pub mod error;
pub mod news_feed;
pub mod reconnect;
pub mod service;
pub mod tail;

pub use config::FeedClientConfig;
pub use error::FeedClientError;
pub use news_feed::NewsFeed;
pub use reconnect::ReconnectPolicy;
pub use service::{FeedClientService, FeedEvent};
