// flash_relay/src/coordinator/mod.rs

//! 中继协调器。
//!
//! 上游连接状态、客户端注册表、心跳计时和重连计时器都归协调器独占。所有连接任务
//! 只通过 [`RelayEvent`] 与它交互，事件在单个循环里逐个处理，因此注册、注销、
//! 心跳扫描和广播之间不会交错。

pub mod events;
pub mod snapshot;

use crate::config::RelayConfig;
use crate::upstream::connector::UpstreamConnector;
use crate::upstream::message_filter;
use crate::ws_server::broadcaster::Broadcaster;
use crate::ws_server::client_session::{ClientHandle, ClientLink};
use crate::ws_server::connection_manager::ClientRegistry;
use crate::ws_server::heartbeat_monitor::HeartbeatMonitor;
use common_models::UpstreamStatusPayload;
use events::{RelayEvent, UpstreamEvent};
use log::{debug, error, info, warn};
use rust_websocket_utils::message::{decode_json, message_type, CloseInfo, CLOSE_GOING_AWAY, CLOSE_NORMAL};
use snapshot::RelaySnapshot;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// 停机时发给上游和客户端的关闭原因。
pub const SHUTDOWN_CLOSE_REASON: &str = "Server shutting down";

/// 与运行中的协调器交互的句柄，可以任意克隆。
#[derive(Debug, Clone)]
pub struct RelayHandle {
    events: mpsc::UnboundedSender<RelayEvent>,
    snapshot: Arc<RelaySnapshot>,
}

impl RelayHandle {
    /// 投递一个事件。协调器已退出时返回 `false`。
    pub fn send(&self, event: RelayEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// 请求优雅停机。重复请求会被协调器忽略。
    pub fn shutdown(&self, reason: impl Into<String>) -> bool {
        self.send(RelayEvent::Shutdown { reason: reason.into() })
    }

    pub fn snapshot(&self) -> &RelaySnapshot {
        &self.snapshot
    }
}

pub struct RelayCoordinator {
    connector: UpstreamConnector,
    registry: ClientRegistry,
    broadcaster: Broadcaster,
    heartbeat: HeartbeatMonitor,
    events: mpsc::UnboundedReceiver<RelayEvent>,
    snapshot: Arc<RelaySnapshot>,
    /// 收到停机请求后为 `Some`。
    shutdown_reason: Option<String>,
}

impl RelayCoordinator {
    pub fn new(config: &RelayConfig) -> (Self, RelayHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let snapshot = Arc::new(RelaySnapshot::default());
        let coordinator = Self {
            connector: UpstreamConnector::new(config.upstream_url.clone(), config.reconnect_delay(), events_tx.clone()),
            registry: ClientRegistry::new(),
            broadcaster: Broadcaster::new(),
            heartbeat: HeartbeatMonitor::new(config.heartbeat_interval()),
            events: events_rx,
            snapshot: Arc::clone(&snapshot),
            shutdown_reason: None,
        };
        let handle = RelayHandle { events: events_tx, snapshot };
        (coordinator, handle)
    }

    /// 启动心跳与上游连接，然后处理事件直到停机完成。
    ///
    /// 停机完成指：已收到停机请求，所有客户端都已上报关闭，上游连接任务也已结束。
    pub async fn run(mut self) {
        info!("[中继协调器] 已启动");
        self.heartbeat.start();
        self.connector.connect();
        self.publish_snapshot();

        while !self.is_drained() {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = self.connector.reconnect_due() => {
                    self.connector.fire_reconnect();
                }
                _ = self.heartbeat.tick() => self.run_heartbeat_sweep(),
            }
            self.publish_snapshot();
        }
        info!("[中继协调器] 所有连接均已关闭，协调器退出");
    }

    fn is_drained(&self) -> bool {
        self.shutdown_reason.is_some() && self.registry.is_empty() && !self.connector.has_link()
    }

    fn publish_snapshot(&self) {
        self.snapshot.publish(
            self.connector.is_connected(),
            self.registry.len(),
            self.broadcaster.last_sent_count(),
            self.broadcaster.total_deliveries(),
        );
    }

    fn handle_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::ClientConnected { addr, link, registered } => {
                self.on_client_connected(addr, link, registered)
            }
            RelayEvent::ClientPong { handle } => {
                self.registry.record_liveness(handle);
            }
            RelayEvent::ClientClosed { handle, close } => {
                if let Some(session) = self.registry.unregister(handle) {
                    if let Some(info) = close {
                        debug!("[服务器] 客户端 {} 关闭代码 {}: {}", session.client_id, info.code, info.reason);
                    }
                }
            }
            RelayEvent::ClientError { handle, error } => {
                match self.registry.unregister(handle) {
                    Some(session) => error!("[服务器] 客户端 {} 连接出错: {}", session.client_id, error),
                    None => debug!("[服务器] 已移除的客户端 {} 报告错误: {}", handle, error),
                }
            }
            RelayEvent::Upstream { epoch, event } => self.on_upstream_event(epoch, event),
            RelayEvent::Shutdown { reason } => self.begin_shutdown(reason),
        }
    }

    fn on_client_connected(&mut self, addr: SocketAddr, link: ClientLink, registered: oneshot::Sender<ClientHandle>) {
        if self.shutdown_reason.is_some() {
            info!("[服务器] 正在停机，拒绝来自 {} 的新连接", addr);
            link.close(CloseInfo::new(CLOSE_GOING_AWAY, SHUTDOWN_CLOSE_REASON));
            return;
        }

        let handle = self.registry.register(addr, link, self.connector.is_connected());
        if registered.send(handle).is_err() {
            // 连接任务在注册完成前就已退出
            self.registry.unregister(handle);
        }
    }

    fn on_upstream_event(&mut self, epoch: u64, event: UpstreamEvent) {
        match event {
            UpstreamEvent::Opened => {
                if self.connector.handle_opened(epoch) {
                    self.broadcast_upstream_status(true);
                }
            }
            UpstreamEvent::Message(text) => {
                if self.connector.is_current(epoch) {
                    self.relay_upstream_message(&text);
                }
            }
            UpstreamEvent::Error(message) => {
                if self.connector.is_current(epoch) {
                    error!("[上游连接] 上游连接出错: {}", message);
                }
            }
            UpstreamEvent::Closed(info) => {
                if self.connector.handle_closed(epoch, &info) {
                    self.broadcast_upstream_status(false);
                    self.connector.schedule_reconnect();
                }
            }
        }
    }

    /// 解析、过滤并广播一条上游消息。无法解析的消息只记录日志。
    fn relay_upstream_message(&mut self, text: &str) {
        let message = match decode_json(text) {
            Ok(message) => message,
            Err(e) => {
                error!("[上游连接] 解析上游消息失败: {}", e);
                return;
            }
        };

        if !message_filter::accept(&message) {
            debug!("[上游连接] 丢弃类型为 {:?} 的消息", message_type(&message));
            return;
        }

        let kind = message_type(&message).unwrap_or_default();
        info!("[上游连接] 收到 {} 消息", kind);
        match self.broadcaster.broadcast(&self.registry, &message) {
            Ok(0) => {}
            Ok(sent) => info!("[广播] 已发送给 {} 个客户端", sent),
            Err(e) => error!("[广播] 序列化 {} 消息失败: {}", kind, e),
        }
    }

    fn broadcast_upstream_status(&mut self, connected: bool) {
        match self.broadcaster.broadcast(&self.registry, &UpstreamStatusPayload::new(connected)) {
            Ok(sent) => debug!("[广播] 上游状态 connected={} 已发送给 {} 个客户端", connected, sent),
            Err(e) => error!("[广播] 序列化上游状态失败: {}", e),
        }
    }

    fn run_heartbeat_sweep(&mut self) {
        let report = self.registry.sweep();
        debug!(
            "[心跳监视器] 本轮扫描完成: 探测 {} 个客户端，断开 {} 个",
            report.probed,
            report.evicted.len()
        );
    }

    /// 有序停机：置停机标志，取消重连，停止心跳，关闭上游 (1000)，关闭所有客户端 (1001)。
    fn begin_shutdown(&mut self, reason: String) {
        if self.shutdown_reason.is_some() {
            warn!("[服务器] 已在停机中，忽略重复的停机请求 ({})", reason);
            return;
        }
        info!("[服务器] 收到停机请求 ({})，开始优雅停机...", reason);
        self.shutdown_reason = Some(reason);

        self.connector.begin_shutdown();
        self.heartbeat.stop();
        if self.connector.close(CloseInfo::new(CLOSE_NORMAL, SHUTDOWN_CLOSE_REASON)) {
            info!("[服务器] 正在关闭上游连接");
        }
        let closing = self
            .registry
            .close_all(&CloseInfo::new(CLOSE_GOING_AWAY, SHUTDOWN_CLOSE_REASON));
        info!("[服务器] 正在关闭 {} 个客户端连接", closing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_server::client_session::{ClientCommand, ReadyState};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> RelayConfig {
        let mut config = RelayConfig::new("ws://127.0.0.1:1");
        config.heartbeat_interval_ms = 60_000;
        config.reconnect_delay_ms = 50;
        config
    }

    async fn connect_client(handle: &RelayHandle, port: u16) -> (Option<ClientHandle>, ClientLink, mpsc::UnboundedReceiver<ClientCommand>) {
        let (link, commands) = ClientLink::channel();
        let (registered_tx, registered_rx) = oneshot::channel();
        assert!(handle.send(RelayEvent::ClientConnected {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            link: link.clone(),
            registered: registered_tx,
        }));
        let registered = timeout(Duration::from_secs(5), registered_rx).await.unwrap().ok();
        (registered, link, commands)
    }

    async fn next_command(commands: &mut mpsc::UnboundedReceiver<ClientCommand>) -> ClientCommand {
        timeout(Duration::from_secs(5), commands.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_idle_relay_stops_after_shutdown() {
        let (coordinator, handle) = RelayCoordinator::new(&test_config());
        let running = tokio::spawn(coordinator.run());

        assert!(handle.shutdown("test"));
        timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
        assert!(!handle.snapshot().upstream_connected());
        assert!(!handle.shutdown("again"));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_upstream_reconnect() {
        // 上游只接受 TCP 连接随即断开，每次连接尝试都会握手失败
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config();
        config.upstream_url = format!("ws://{}", listener.local_addr().unwrap());
        config.reconnect_delay_ms = 500;
        let (attempts_tx, mut attempts) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
                let _ = attempts_tx.send(());
            }
        });

        let (coordinator, handle) = RelayCoordinator::new(&config);
        let running = tokio::spawn(coordinator.run());
        timeout(Duration::from_secs(5), attempts.recv()).await.unwrap().unwrap();
        // 等失败被处理，重连计时器进入等待
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.snapshot().upstream_connected());

        assert!(handle.shutdown("test"));
        timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
        // 超过重连间隔也没有新的连接尝试
        assert!(timeout(Duration::from_millis(1_000), attempts.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_client_receives_ack_and_is_closed_on_shutdown() {
        let (coordinator, handle) = RelayCoordinator::new(&test_config());
        let running = tokio::spawn(coordinator.run());

        let (client, link, mut commands) = connect_client(&handle, 42001).await;
        let client = client.expect("客户端应当注册成功");
        match next_command(&mut commands).await {
            ClientCommand::Text(text) => {
                let ack: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(ack, json!({"type": "connection", "status": "connected", "upstreamConnected": false}));
            }
            other => panic!("预期连接确认，实际为 {:?}", other),
        }

        handle.shutdown("test");
        loop {
            match next_command(&mut commands).await {
                ClientCommand::Close(info) => {
                    assert_eq!(info, CloseInfo::new(CLOSE_GOING_AWAY, SHUTDOWN_CLOSE_REASON));
                    break;
                }
                // 上游连接失败时的 upstream_status 通知
                ClientCommand::Text(_) => continue,
                other => panic!("预期关闭命令，实际为 {:?}", other),
            }
        }
        assert_eq!(link.ready_state(), ReadyState::Closing);

        // 停机期间的新连接被直接关闭，不会注册
        let (late, late_link, mut late_commands) = connect_client(&handle, 42002).await;
        assert!(late.is_none());
        assert_eq!(late_link.ready_state(), ReadyState::Closing);
        assert!(matches!(next_command(&mut late_commands).await, ClientCommand::Close(_)));

        // 协调器等到客户端上报关闭后才退出
        assert!(!running.is_finished());
        handle.send(RelayEvent::ClientClosed { handle: client, close: None });
        timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
        assert_eq!(handle.snapshot().client_count(), 0);
    }
}
