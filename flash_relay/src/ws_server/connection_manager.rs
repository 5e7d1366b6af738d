// flash_relay/src/ws_server/connection_manager.rs

//! 客户端注册表。
//!
//! 注册表只由中继协调器持有和修改，因此不需要锁。会话按接入顺序保存在
//! `BTreeMap` 中，广播和心跳扫描都按这个顺序遍历。

use crate::ws_server::client_session::{ClientHandle, ClientLink, ClientSession};
use common_models::ConnectionAckPayload;
use log::{debug, error, info, warn};
use rust_websocket_utils::message::CloseInfo;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// 一次心跳扫描的结果。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// 被强制断开的会话标识。
    pub evicted: Vec<String>,
    /// 本轮发出 Ping 探测的会话数量。
    pub probed: usize,
}

/// 当前已连接的浏览器客户端集合。
#[derive(Debug, Default)]
pub struct ClientRegistry {
    sessions: BTreeMap<ClientHandle, ClientSession>,
    next_handle: u64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个新接入的客户端，并立即给它发送连接确认。
    ///
    /// # Arguments
    /// * `addr` - 客户端远端地址。
    /// * `link` - 指向该客户端连接任务的句柄。
    /// * `upstream_connected` - 此刻上游是否已连接，写入确认消息的 `upstreamConnected`。
    ///
    /// # Returns
    /// * `ClientHandle` - 之后的 Pong、关闭、错误事件都以此句柄引用该会话。
    pub fn register(&mut self, addr: SocketAddr, link: ClientLink, upstream_connected: bool) -> ClientHandle {
        self.next_handle += 1;
        let handle = ClientHandle(self.next_handle);
        let session = ClientSession::new(handle, addr, link);

        match serde_json::to_string(&ConnectionAckPayload::new(upstream_connected)) {
            Ok(ack) => {
                if !session.link.send_text(Arc::from(ack)) {
                    warn!("[连接管理器] 客户端 {} 在收到连接确认前已不可用", session.client_id);
                }
            }
            Err(e) => error!("[连接管理器] 序列化连接确认失败: {}", e),
        }

        info!(
            "[连接管理器] 客户端已连接: {} (当前客户端数: {})",
            session.client_id,
            self.sessions.len() + 1
        );
        self.sessions.insert(handle, session);
        handle
    }

    /// 移除一个会话。重复移除或移除未知句柄不会产生任何效果。
    pub fn unregister(&mut self, handle: ClientHandle) -> Option<ClientSession> {
        let removed = self.sessions.remove(&handle);
        if let Some(session) = &removed {
            info!(
                "[连接管理器] 客户端已断开: {} (当前客户端数: {})",
                session.client_id,
                self.sessions.len()
            );
        }
        removed
    }

    /// 收到 Pong 后把会话标记为存活。
    pub fn record_liveness(&mut self, handle: ClientHandle) -> bool {
        match self.sessions.get_mut(&handle) {
            Some(session) => {
                session.is_alive = true;
                true
            }
            None => false,
        }
    }

    /// 执行一轮心跳扫描。
    ///
    /// 上一轮之后仍未回复 Pong 的会话被强制断开并移除；其余会话标记为未存活，
    /// 并发送一个 Ping 探测，等待下一轮检查。
    pub fn sweep(&mut self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut dead = Vec::new();

        for (handle, session) in self.sessions.iter_mut() {
            if !session.is_alive {
                info!("[心跳监视器] 客户端 {} 未响应心跳，强制断开", session.client_id);
                session.link.terminate();
                dead.push(*handle);
                continue;
            }
            session.is_alive = false;
            if session.link.ping() {
                report.probed += 1;
            } else {
                debug!("[心跳监视器] 客户端 {} 当前不可写，跳过本轮 Ping", session.client_id);
            }
        }

        for handle in dead {
            if let Some(session) = self.sessions.remove(&handle) {
                report.evicted.push(session.client_id);
            }
        }
        report
    }

    /// 以给定的关闭代码关闭所有客户端，返回发出关闭请求的数量。
    ///
    /// 会话仍保留在注册表中，直到各自的连接任务上报关闭。
    pub fn close_all(&self, info: &CloseInfo) -> usize {
        for session in self.sessions.values() {
            session.link.close(info.clone());
        }
        self.sessions.len()
    }

    pub fn get(&self, handle: ClientHandle) -> Option<&ClientSession> {
        self.sessions.get(&handle)
    }

    /// 按接入顺序遍历会话。
    pub fn sessions(&self) -> impl Iterator<Item = &ClientSession> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_server::client_session::{ClientCommand, ReadyState};
    use rust_websocket_utils::message::CLOSE_GOING_AWAY;
    use serde_json::{json, Value};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn register_client(
        registry: &mut ClientRegistry,
        port: u16,
        upstream_connected: bool,
    ) -> (ClientHandle, ClientLink, UnboundedReceiver<ClientCommand>) {
        let (link, commands) = ClientLink::channel();
        let handle = registry.register(addr(port), link.clone(), upstream_connected);
        (handle, link, commands)
    }

    fn next_json(commands: &mut UnboundedReceiver<ClientCommand>) -> Value {
        match commands.try_recv() {
            Ok(ClientCommand::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("预期文本命令，实际为 {:?}", other),
        }
    }

    #[test]
    fn test_register_sends_exactly_one_ack() {
        let mut registry = ClientRegistry::new();
        let (_, _, mut offline) = register_client(&mut registry, 40001, false);
        let (_, _, mut online) = register_client(&mut registry, 40002, true);

        assert_eq!(
            next_json(&mut offline),
            json!({"type": "connection", "status": "connected", "upstreamConnected": false})
        );
        assert!(offline.try_recv().is_err());
        assert_eq!(next_json(&mut online)["upstreamConnected"], json!(true));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ClientRegistry::new();
        let (handle, _, _commands) = register_client(&mut registry, 40001, true);

        assert!(registry.unregister(handle).is_some());
        assert!(registry.unregister(handle).is_none());
        assert!(registry.unregister(ClientHandle(999)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sessions_iterate_in_registration_order() {
        let mut registry = ClientRegistry::new();
        for port in [40003, 40001, 40002] {
            let (link, _commands) = ClientLink::channel();
            registry.register(addr(port), link, false);
        }
        let ports: Vec<u16> = registry.sessions().map(|s| s.addr.port()).collect();
        assert_eq!(ports, vec![40003, 40001, 40002]);
    }

    #[test]
    fn test_sweep_probes_then_evicts_silent_clients() {
        let mut registry = ClientRegistry::new();
        let (responsive, _, mut responsive_rx) = register_client(&mut registry, 40001, true);
        let (_, silent_link, mut silent_rx) = register_client(&mut registry, 40002, true);
        next_json(&mut responsive_rx);
        next_json(&mut silent_rx);

        // 第一轮：两个会话都是新接入的，只会收到 Ping
        let first = registry.sweep();
        assert_eq!(first.probed, 2);
        assert!(first.evicted.is_empty());
        assert!(matches!(responsive_rx.try_recv(), Ok(ClientCommand::Ping)));
        assert!(matches!(silent_rx.try_recv(), Ok(ClientCommand::Ping)));

        // 只有一个会话回复了 Pong
        assert!(registry.record_liveness(responsive));

        let second = registry.sweep();
        assert_eq!(second.probed, 1);
        assert_eq!(second.evicted.len(), 1);
        assert!(second.evicted[0].starts_with("127.0.0.1:"));
        // 强制断开不经过命令队列
        assert!(silent_rx.try_recv().is_err());
        assert_eq!(silent_link.ready_state(), ReadyState::Closed);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(responsive).is_some());
    }

    #[test]
    fn test_pong_from_unknown_handle_is_ignored() {
        let mut registry = ClientRegistry::new();
        assert!(!registry.record_liveness(ClientHandle(42)));
    }

    #[test]
    fn test_close_all_keeps_sessions_until_tasks_report_closed() {
        let mut registry = ClientRegistry::new();
        let (_, link_a, _rx_a) = register_client(&mut registry, 40001, true);
        let (_, link_b, _rx_b) = register_client(&mut registry, 40002, true);

        let closed = registry.close_all(&CloseInfo::new(CLOSE_GOING_AWAY, "Server shutting down"));
        assert_eq!(closed, 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(link_a.ready_state(), ReadyState::Closing);
        assert_eq!(link_b.ready_state(), ReadyState::Closing);
    }
}
