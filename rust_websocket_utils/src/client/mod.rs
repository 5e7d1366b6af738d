// rust_websocket_utils/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! 主要职责包括：
//! - **连接建立**: 校验 URL 并连接到远程 WebSocket 服务器（`ws://` 或 `wss://`）。
//! - **帧接收**: 把底层消息归类为 `WsFrame`，把"连接已关闭"统一表示为 `None`。
//! - **控制帧发送**: 回复 Pong、发送带关闭代码的关闭帧。
//!
//! 重连策略不在这里实现，由使用方（中继的上游连接器、订阅客户端）各自决定。

pub mod transport;
