// flash_relay/src/config.rs

//! 中继服务配置。
//!
//! 所有配置项都来自环境变量，在启动时读取一次：
//!
//! | 环境变量 | 字段 | 默认值 |
//! |---|---|---|
//! | `HOST` | `host` | `0.0.0.0` |
//! | `PORT` | `port` | `3001` |
//! | `UPSTREAM_WS_URL` | `upstream_url` | 必填 |
//! | `HEARTBEAT_INTERVAL_MS` | `heartbeat_interval_ms` | `30000` |
//! | `RECONNECT_DELAY_MS` | `reconnect_delay_ms` | `5000` |
//! | `SHUTDOWN_TIMEOUT_MS` | `shutdown_timeout_ms` | `10000` |

use crate::error::AppError;
use log::info;
use rust_websocket_utils::client::transport::parse_ws_url;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 中继服务的默认主机地址
pub const DEFAULT_WS_HOST: &str = "0.0.0.0";
/// 中继服务的默认端口号
pub const DEFAULT_WS_PORT: u16 = 3001;
/// 默认心跳扫描间隔（毫秒）
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// 上游断开后的默认重连延迟（毫秒）
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
/// 优雅停机的默认最长等待时间（毫秒）
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_UPSTREAM_WS_URL: &str = "UPSTREAM_WS_URL";
pub const ENV_HEARTBEAT_INTERVAL_MS: &str = "HEARTBEAT_INTERVAL_MS";
pub const ENV_RECONNECT_DELAY_MS: &str = "RECONNECT_DELAY_MS";
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "SHUTDOWN_TIMEOUT_MS";

/// 中继服务配置结构体
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// HTTP / WebSocket 监听的主机地址
    pub host: String,
    /// 监听端口；为 0 时由操作系统分配
    pub port: u16,
    /// 上游快讯源的 WebSocket URL（`ws://` 或 `wss://`）
    pub upstream_url: String,
    /// 心跳扫描间隔（毫秒）
    pub heartbeat_interval_ms: u64,
    /// 上游断开后到下一次连接尝试的固定延迟（毫秒）
    pub reconnect_delay_ms: u64,
    /// 收到停机信号后等待有序关闭的最长时间（毫秒）
    pub shutdown_timeout_ms: u64,
}

impl RelayConfig {
    /// 以默认值创建配置，只需指定上游 URL。
    pub fn new(upstream_url: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_WS_HOST.to_string(),
            port: DEFAULT_WS_PORT,
            upstream_url: upstream_url.into(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }

    /// 从进程环境变量加载配置。
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 通过给定的查找函数加载配置，便于在测试中替代真实的环境变量。
    ///
    /// # Arguments
    /// * `lookup` - 按变量名返回取值；未设置时返回 `None`。空字符串视同未设置。
    ///
    /// # Returns
    /// * `Result<RelayConfig, AppError>` - 缺少上游 URL、数值无法解析或校验失败时返回
    ///   `AppError::ConfigError`。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let upstream_url = read(ENV_UPSTREAM_WS_URL).ok_or_else(|| {
            AppError::ConfigError(format!("缺少必需的环境变量 {}", ENV_UPSTREAM_WS_URL))
        })?;

        let config = Self {
            host: read(ENV_HOST).unwrap_or_else(|| DEFAULT_WS_HOST.to_string()),
            port: parse_or_default(read(ENV_PORT), ENV_PORT, DEFAULT_WS_PORT)?,
            upstream_url,
            heartbeat_interval_ms: parse_or_default(
                read(ENV_HEARTBEAT_INTERVAL_MS),
                ENV_HEARTBEAT_INTERVAL_MS,
                DEFAULT_HEARTBEAT_INTERVAL_MS,
            )?,
            reconnect_delay_ms: parse_or_default(
                read(ENV_RECONNECT_DELAY_MS),
                ENV_RECONNECT_DELAY_MS,
                DEFAULT_RECONNECT_DELAY_MS,
            )?,
            shutdown_timeout_ms: parse_or_default(
                read(ENV_SHUTDOWN_TIMEOUT_MS),
                ENV_SHUTDOWN_TIMEOUT_MS,
                DEFAULT_SHUTDOWN_TIMEOUT_MS,
            )?,
        };
        config.validate()?;

        info!(
            "[配置模块] 配置已加载: 监听 {}，上游 {}，心跳 {}ms，重连延迟 {}ms，停机超时 {}ms",
            config.bind_address(),
            config.upstream_url,
            config.heartbeat_interval_ms,
            config.reconnect_delay_ms,
            config.shutdown_timeout_ms
        );
        Ok(config)
    }

    /// 校验配置。上游 URL 必须是 ws/wss，各时间间隔不能为 0。
    pub fn validate(&self) -> Result<(), AppError> {
        parse_ws_url(&self.upstream_url)
            .map_err(|e| AppError::ConfigError(format!("{} 无效: {}", ENV_UPSTREAM_WS_URL, e)))?;

        let durations = [
            (ENV_HEARTBEAT_INTERVAL_MS, self.heartbeat_interval_ms),
            (ENV_RECONNECT_DELAY_MS, self.reconnect_delay_ms),
            (ENV_SHUTDOWN_TIMEOUT_MS, self.shutdown_timeout_ms),
        ];
        for (key, value) in durations {
            if value == 0 {
                return Err(AppError::ConfigError(format!("{} 必须大于 0", key)));
            }
        }
        Ok(())
    }

    /// `host:port` 形式的监听地址。
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn parse_or_default<T>(raw: Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|e| {
            AppError::ConfigError(format!("环境变量 {} 的值 '{}' 无法解析: {}", key, value, e))
        }),
    }
}
