// flash_relay/src/ws_server/broadcaster.rs

use crate::error::AppError;
use crate::ws_server::connection_manager::ClientRegistry;
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// 向所有就绪客户端扇出消息。
///
/// 每条消息只序列化一次，所有客户端共享同一份 `Arc<str>` 负载。
#[derive(Debug, Default)]
pub struct Broadcaster {
    last_sent_count: usize,
    total_deliveries: u64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// 序列化消息并发送给注册表中所有处于 `Open` 状态的客户端。
    ///
    /// # Returns
    /// * `Result<usize, AppError>` - 实际排入发送队列的客户端数量；序列化失败时返回错误，
    ///   此时不会向任何客户端发送。
    pub fn broadcast<T>(&mut self, registry: &ClientRegistry, message: &T) -> Result<usize, AppError>
    where
        T: Serialize + ?Sized,
    {
        let payload: Arc<str> = Arc::from(serde_json::to_string(message)?);
        Ok(self.broadcast_payload(registry, payload))
    }

    /// 发送一份已经序列化好的负载。未就绪的客户端被静默跳过。
    pub fn broadcast_payload(&mut self, registry: &ClientRegistry, payload: Arc<str>) -> usize {
        let mut sent = 0;
        for session in registry.sessions() {
            if session.link.send_text(Arc::clone(&payload)) {
                sent += 1;
            } else {
                debug!("[广播] 跳过未就绪的客户端 {}", session.client_id);
            }
        }
        self.last_sent_count = sent;
        self.total_deliveries += sent as u64;
        sent
    }

    /// 最近一次广播实际发送的客户端数量。
    pub fn last_sent_count(&self) -> usize {
        self.last_sent_count
    }

    /// 自启动以来累计的投递次数。
    pub fn total_deliveries(&self) -> u64 {
        self.total_deliveries
    }
}
