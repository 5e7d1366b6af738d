// flash_feed_client/src/config.rs

//! 订阅客户端配置。

use anyhow::{anyhow, Context, Result};
use rust_websocket_utils::client::transport::parse_ws_url;
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// 未指定时连接的中继地址。
pub const DEFAULT_RELAY_URL: &str = "ws://localhost:3001";
/// 读取中继地址的环境变量。
pub const ENV_RELAY_URL: &str = "FLASH_RELAY_URL";
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_INITIAL_RECONNECT_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30_000;
/// 快讯列表保留的最大条目数。
pub const DEFAULT_MAX_MESSAGES: usize = 100;

/// 订阅客户端连接配置。
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FeedClientConfig {
    /// 中继的 WebSocket URL，例如 `ws://127.0.0.1:3001/ws`。
    pub relay_url: String,
    /// 连续重连失败多少次后放弃。连接成功后计数清零。
    pub max_reconnect_attempts: u32,
    /// 第一次重连前的等待时间；之后每次翻倍。
    pub initial_reconnect_delay_ms: u64,
    /// 重连等待时间的上限。
    pub max_reconnect_delay_ms: u64,
    pub max_messages: usize,
}

impl FeedClientConfig {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            initial_reconnect_delay_ms: DEFAULT_INITIAL_RECONNECT_DELAY_MS,
            max_reconnect_delay_ms: DEFAULT_MAX_RECONNECT_DELAY_MS,
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }

    /// 从 `FLASH_RELAY_URL` 读取中继地址，未设置时使用 [`DEFAULT_RELAY_URL`]，其余取默认值。
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 与 [`from_env`](Self::from_env) 相同，但变量值由 `lookup` 提供。
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let relay_url = lookup(ENV_RELAY_URL)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
        let config = Self::new(relay_url);
        config
            .validate()
            .with_context(|| format!("环境变量 {} 的值无效", ENV_RELAY_URL))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        parse_ws_url(&self.relay_url).with_context(|| format!("无效的中继地址 '{}'", self.relay_url))?;
        if self.max_messages == 0 {
            return Err(anyhow!("max_messages 必须大于 0"));
        }
        if self.initial_reconnect_delay_ms > self.max_reconnect_delay_ms {
            return Err(anyhow!(
                "初始重连延迟 ({}ms) 不能大于重连延迟上限 ({}ms)",
                self.initial_reconnect_delay_ms,
                self.max_reconnect_delay_ms
            ));
        }
        Ok(())
    }

    pub fn initial_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.initial_reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }
}
