// flash_relay/src/upstream/connector.rs

//! 上游连接状态机。
//!
//! ```text
//! Disconnected --connect--> Connecting --open--> Open
//!      ^                        |                  |
//!      +-------- closed --------+------ closed ----+
//! 任意状态 --begin_shutdown--> ShuttingDown（终态）
//! ```
//!
//! 连接断开后按固定延迟重连，不设上限。同一时刻最多只有一个待触发的重连计时器，
//! 也最多只有一个活动的连接任务。

use crate::coordinator::events::RelayEvent;
use crate::upstream::connection::{spawn_upstream_connection, UpstreamLink};
use log::{debug, info, warn};
use rust_websocket_utils::message::CloseInfo;
use std::future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamState {
    Disconnected,
    Connecting,
    Open,
    ShuttingDown,
}

#[derive(Debug)]
pub struct UpstreamConnector {
    url: String,
    reconnect_delay: Duration,
    state: UpstreamState,
    /// 每次连接尝试递增；用来丢弃旧连接迟到的事件。
    epoch: u64,
    link: Option<UpstreamLink>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    events: mpsc::UnboundedSender<RelayEvent>,
}

impl UpstreamConnector {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration, events: mpsc::UnboundedSender<RelayEvent>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            state: UpstreamState::Disconnected,
            epoch: 0,
            link: None,
            reconnect_timer: None,
            events,
        }
    }

    pub fn state(&self) -> UpstreamState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == UpstreamState::Open
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state == UpstreamState::ShuttingDown
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    /// 是否还有尚未上报 `Closed` 的连接任务。
    pub fn has_link(&self) -> bool {
        self.link.is_some()
    }

    /// 发起一次连接尝试。
    ///
    /// 停机期间，或已经在连接中 / 已连接时不做任何事并返回 `false`。
    pub fn connect(&mut self) -> bool {
        match self.state {
            UpstreamState::ShuttingDown => {
                debug!("[上游连接] 正在停机，忽略连接请求");
                return false;
            }
            UpstreamState::Connecting | UpstreamState::Open => {
                warn!("[上游连接] 已存在活动连接 ({:?})，忽略重复的连接请求", self.state);
                return false;
            }
            UpstreamState::Disconnected => {}
        }

        self.epoch += 1;
        info!("[上游连接] 正在连接上游 {} (第 {} 次尝试)", self.url, self.epoch);
        self.link = Some(spawn_upstream_connection(self.url.clone(), self.epoch, self.events.clone()));
        self.state = UpstreamState::Connecting;
        true
    }

    /// 事件是否来自当前的连接任务。
    pub fn is_current(&self, epoch: u64) -> bool {
        self.link.as_ref().map_or(false, |link| link.epoch() == epoch)
    }

    /// 处理连接打开。返回 `true` 表示需要向客户端广播 `connected: true`。
    pub fn handle_opened(&mut self, epoch: u64) -> bool {
        if !self.is_current(epoch) || self.state != UpstreamState::Connecting {
            return false;
        }
        info!("[上游连接] 已连接到上游 {}", self.url);
        self.state = UpstreamState::Open;
        true
    }

    /// 处理连接结束。返回 `true` 表示事件来自当前连接。
    pub fn handle_closed(&mut self, epoch: u64, info: &CloseInfo) -> bool {
        if !self.is_current(epoch) {
            debug!("[上游连接] 忽略过期连接 (代次 {}) 的关闭事件", epoch);
            return false;
        }
        info!("[上游连接] 上游连接已关闭 (代码 {}: {})", info.code, info.reason);
        self.link = None;
        if self.state != UpstreamState::ShuttingDown {
            self.state = UpstreamState::Disconnected;
        }
        true
    }

    /// 安排一次延迟重连。停机期间或已有待触发的计时器时不做任何事。
    pub fn schedule_reconnect(&mut self) -> bool {
        if self.is_shutting_down() || self.reconnect_timer.is_some() {
            return false;
        }
        info!("[上游连接] 将在 {}ms 后重连", self.reconnect_delay.as_millis());
        self.reconnect_timer = Some(Box::pin(sleep(self.reconnect_delay)));
        true
    }

    /// 等待重连计时器到期；没有计时器时永远不会完成。
    pub async fn reconnect_due(&mut self) {
        match self.reconnect_timer.as_mut() {
            Some(timer) => timer.as_mut().await,
            None => future::pending::<()>().await,
        }
    }

    /// 计时器到期后调用：清除计时器并发起连接。
    pub fn fire_reconnect(&mut self) -> bool {
        self.reconnect_timer = None;
        self.connect()
    }

    /// 进入停机状态并取消待触发的重连。此后 `connect` 和 `schedule_reconnect` 都不再生效。
    pub fn begin_shutdown(&mut self) {
        self.state = UpstreamState::ShuttingDown;
        if self.reconnect_timer.take().is_some() {
            debug!("[上游连接] 已取消待触发的重连");
        }
    }

    /// 请求关闭当前连接。没有活动连接时返回 `false`。
    pub fn close(&mut self, info: CloseInfo) -> bool {
        match &self.link {
            Some(link) => link.close(info),
            None => false,
        }
    }
}
