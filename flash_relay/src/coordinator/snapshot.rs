// flash_relay/src/coordinator/snapshot.rs

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// 协调器状态的只读快照，供 `/health` 与测试读取。
///
/// 只有协调器写入；每处理完一个事件刷新一次。
#[derive(Debug, Default)]
pub struct RelaySnapshot {
    upstream_connected: AtomicBool,
    client_count: AtomicUsize,
    last_broadcast_count: AtomicUsize,
    total_deliveries: AtomicU64,
}

impl RelaySnapshot {
    pub fn upstream_connected(&self) -> bool {
        self.upstream_connected.load(Ordering::Acquire)
    }

    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Acquire)
    }

    /// 最近一次广播实际送达的客户端数量。
    pub fn last_broadcast_count(&self) -> usize {
        self.last_broadcast_count.load(Ordering::Acquire)
    }

    pub fn total_deliveries(&self) -> u64 {
        self.total_deliveries.load(Ordering::Acquire)
    }

    pub(crate) fn publish(
        &self,
        upstream_connected: bool,
        client_count: usize,
        last_broadcast_count: usize,
        total_deliveries: u64,
    ) {
        self.upstream_connected.store(upstream_connected, Ordering::Release);
        self.client_count.store(client_count, Ordering::Release);
        self.last_broadcast_count.store(last_broadcast_count, Ordering::Release);
        self.total_deliveries.store(total_deliveries, Ordering::Release);
    }
}
