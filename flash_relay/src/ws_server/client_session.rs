// flash_relay/src/ws_server/client_session.rs

use chrono::{DateTime, Utc};
use rust_websocket_utils::message::CloseInfo;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// 注册表内部使用的会话句柄，按接入顺序递增。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientHandle(pub u64);

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 客户端连接的就绪状态，取值与浏览器 WebSocket 的 `readyState` 一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// 发给客户端连接任务的命令。
#[derive(Debug)]
pub enum ClientCommand {
    /// 发送一个已序列化好的文本帧。同一次广播的所有客户端共享同一份负载。
    Text(Arc<str>),
    /// 发送一个空负载的 Ping 探测。
    Ping,
    /// 发起关闭握手。
    Close(CloseInfo),
}

/// 协调器持有的、指向某个客户端连接任务的句柄。
///
/// 就绪状态由连接任务和协调器共享：`close` / `terminate` 会同步修改它，
/// 因此在同一轮事件处理中，后续的广播会立即跳过该客户端。
///
/// 强制断开不走命令队列：队列里可能积压着大量未发出的广播，
/// 连接任务在任何等待点上都会同时等待 `terminated` 通知。
#[derive(Debug, Clone)]
pub struct ClientLink {
    commands: mpsc::UnboundedSender<ClientCommand>,
    ready_state: Arc<AtomicU8>,
    terminated: Arc<Notify>,
}

impl ClientLink {
    /// 创建一个处于 `Open` 状态的句柄，以及连接任务读取命令用的接收端。
    pub fn channel() -> (ClientLink, mpsc::UnboundedReceiver<ClientCommand>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let link = ClientLink {
            commands,
            ready_state: Arc::new(AtomicU8::new(ReadyState::Open as u8)),
            terminated: Arc::new(Notify::new()),
        };
        (link, receiver)
    }

    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready_state.load(Ordering::Acquire))
    }

    pub fn set_ready_state(&self, state: ReadyState) {
        self.ready_state.store(state as u8, Ordering::Release);
    }

    /// 连接处于 `Open` 且连接任务仍在运行。
    pub fn is_ready(&self) -> bool {
        self.ready_state() == ReadyState::Open && !self.commands.is_closed()
    }

    /// 排队一个文本帧。连接未就绪时不发送并返回 `false`。
    pub fn send_text(&self, payload: Arc<str>) -> bool {
        self.is_ready() && self.commands.send(ClientCommand::Text(payload)).is_ok()
    }

    pub fn ping(&self) -> bool {
        self.is_ready() && self.commands.send(ClientCommand::Ping).is_ok()
    }

    /// 发起关闭握手，并立即把就绪状态置为 `Closing`。
    pub fn close(&self, info: CloseInfo) {
        if matches!(self.ready_state(), ReadyState::Closing | ReadyState::Closed) {
            return;
        }
        self.set_ready_state(ReadyState::Closing);
        let _ = self.commands.send(ClientCommand::Close(info));
    }

    /// 强制断开，不等待关闭握手，也不再发送队列中积压的消息。
    pub fn terminate(&self) {
        self.set_ready_state(ReadyState::Closed);
        // notify_one 会保留一个许可，连接任务稍后开始等待时也能立即收到
        self.terminated.notify_one();
    }

    /// 等待 [`terminate`](Self::terminate) 被调用。只应由连接任务自身等待。
    pub async fn terminated(&self) {
        self.terminated.notified().await;
    }
}

/// 一个已注册的浏览器客户端会话。
#[derive(Debug)]
pub struct ClientSession {
    /// 日志用的标识，形如 `远端IP:接入时刻毫秒数`。
    pub client_id: String,
    pub handle: ClientHandle,
    pub addr: SocketAddr,
    pub creation_time: DateTime<Utc>,
    /// 上一次心跳扫描之后是否收到过 Pong。新会话为 `true`。
    pub is_alive: bool,
    pub link: ClientLink,
}

impl ClientSession {
    pub fn new(handle: ClientHandle, addr: SocketAddr, link: ClientLink) -> Self {
        let now = Utc::now();
        Self {
            client_id: format!("{}:{}", addr.ip(), now.timestamp_millis()),
            handle,
            addr,
            creation_time: now,
            is_alive: true,
            link,
        }
    }
}
