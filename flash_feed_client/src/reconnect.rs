// flash_feed_client/src/reconnect.rs

use std::time::Duration;

/// 指数退避重连策略：第 n 次重连等待 `min(initial * 2^n, max)`，最多 `max_attempts` 次。
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
            attempts: 0,
        }
    }

    /// 取得下一次重连前的等待时间，并计入一次尝试。次数耗尽时返回 `None`。
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(self.attempts);
        let delay = self.initial_delay.saturating_mul(factor).min(self.max_delay);
        self.attempts += 1;
        Some(delay)
    }

    /// 连接成功或用户手动重连时清零。
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
