// flash_relay/src/coordinator/events.rs

//! 中继协调器的输入事件。所有连接任务都只通过这些事件与协调器交互。

use crate::ws_server::client_session::{ClientHandle, ClientLink};
use rust_websocket_utils::message::CloseInfo;
use std::net::SocketAddr;
use tokio::sync::oneshot;

/// 上游连接任务上报的事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// 握手完成，连接已打开。
    Opened,
    /// 收到一个数据帧（二进制帧已按 UTF-8 宽松解码）。
    Message(String),
    /// 连接或读写失败。之后一定还会收到 `Closed`。
    Error(String),
    /// 连接已结束。没有收到关闭帧时代码为 1006。
    Closed(CloseInfo),
}

#[derive(Debug)]
pub enum RelayEvent {
    /// 一个浏览器客户端完成了 WebSocket 升级。
    ClientConnected {
        addr: SocketAddr,
        link: ClientLink,
        /// 注册成功后回传句柄；停机期间拒绝接入时直接丢弃。
        registered: oneshot::Sender<ClientHandle>,
    },
    ClientPong {
        handle: ClientHandle,
    },
    ClientClosed {
        handle: ClientHandle,
        close: Option<CloseInfo>,
    },
    ClientError {
        handle: ClientHandle,
        error: String,
    },
    /// 带有连接代次的上游事件；代次过期的事件会被忽略。
    Upstream {
        epoch: u64,
        event: UpstreamEvent,
    },
    /// 请求开始优雅停机。
    Shutdown {
        reason: String,
    },
}
