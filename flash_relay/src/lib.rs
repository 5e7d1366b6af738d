//! `flash_relay` 快讯中继核心库。
//!
//! 中继维持一条到上游快讯源的 WebSocket 连接，只把 `flash` 与 `flash_impact` 消息
//! 转发给所有已连接的浏览器客户端，并负责上游重连、客户端心跳检测以及有序停机。
//!
//! 主要模块包括：
//! - `api`: HTTP 路由（健康检查、CORS 预检、404）。
//! - `config`: 从环境变量加载的服务配置。
//! - `coordinator`: 独占全部可变状态的事件循环。
//! - `error`: 应用错误类型。
//! - `state`: 路由共享状态。
//! - `upstream`: 上游连接状态机与消息过滤。
//! - `ws_server`: 客户端接入、注册表、心跳、广播与服务生命周期。

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod state;
pub mod upstream;
pub mod ws_server;

pub use config::RelayConfig;
pub use coordinator::RelayHandle;
pub use error::AppError;
pub use ws_server::service::{BoundRelay, RelayService, ShutdownOutcome};
