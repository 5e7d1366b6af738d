// flash_relay/src/ws_server/heartbeat_monitor.rs

//! 心跳监视器模块。
//!
//! 监视器本身只负责计时：中继协调器在每个周期到来时调用
//! [`ClientRegistry::sweep`](crate::ws_server::connection_manager::ClientRegistry::sweep)
//! 执行"标记并探测"。停机时停止计时，之后不会再有扫描发生。

use log::info;
use std::future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// 周期性心跳计时器。
#[derive(Debug)]
pub struct HeartbeatMonitor {
    /// 两次扫描之间的间隔。
    check_interval: Duration,
    /// 未启动或已停止时为 `None`。
    ticker: Option<Interval>,
}

impl HeartbeatMonitor {
    pub fn new(check_interval: Duration) -> Self {
        Self {
            check_interval,
            ticker: None,
        }
    }

    /// 启动计时。第一次扫描发生在一个完整周期之后，而不是立即发生。
    pub fn start(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let mut ticker = interval_at(Instant::now() + self.check_interval, self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        info!("[心跳监视器] 已启动，检查周期: {:?}", self.check_interval);
    }

    pub fn stop(&mut self) {
        if self.ticker.take().is_some() {
            info!("[心跳监视器] 已停止");
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// 等待下一个扫描周期。监视器未运行时永远不会完成。
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_a_full_period() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        monitor.start();

        assert!(timeout(Duration::from_secs(29), monitor.tick()).await.is_err());
        assert!(timeout(Duration::from_secs(2), monitor.tick()).await.is_ok());
        assert!(timeout(Duration::from_secs(31), monitor.tick()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_monitor_never_ticks() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_millis(10));
        monitor.start();
        monitor.stop();
        assert!(!monitor.is_running());
        assert!(timeout(Duration::from_secs(60), monitor.tick()).await.is_err());
    }
}
