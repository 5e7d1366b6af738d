//! `rust_websocket_utils` 是一个提供 WebSocket 通信实用功能的 Rust Crate。
//! 它封装了 `tokio-tungstenite` 的客户端连接细节，并把底层帧归类为应用层关心的几种事件，
//! 供快讯中继的上游连接以及订阅客户端共同使用。
//!
//! 主要模块包括：
//! - `message`: 帧分类 (`WsFrame`)、关闭信息与 JSON 帧解码。
//! - `error`: 库中使用的统一错误类型 `WsError`。
//! - `client`: WebSocket 客户端传输层。

pub mod client;
pub mod error;
pub mod message;

pub use error::WsError;
pub use message::{CloseInfo, WsFrame};
