// flash_relay/src/ws_server/mod.rs

//! 面向浏览器客户端的 WebSocket 服务。
//!
//! - `client_session`: 会话与连接句柄。
//! - `client_connection`: 每个连接的读写任务。
//! - `connection_manager`: 客户端注册表与心跳扫描。
//! - `heartbeat_monitor`: 心跳计时。
//! - `broadcaster`: 扇出广播。
//! - `service`: 监听、服务与优雅停机。

pub mod broadcaster;
pub mod client_connection;
pub mod client_session;
pub mod connection_manager;
pub mod heartbeat_monitor;
pub mod service;
