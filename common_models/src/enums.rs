//! 通用枚举模块。
//!
//! 本模块定义了中继与客户端之间共享的枚举类型。所有枚举都派生
//! `Serialize`, `Deserialize`, `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`，
//! 在 JSON 中以小写字符串表示，与浏览器端的类型定义保持一致。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 客户端视角下与中继之间的 WebSocket 连接状态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// 正在建立连接（首次连接或等待重连期间发起的新尝试）。
    Connecting,
    /// 连接已建立并可接收快讯。
    Connected,
    /// 连接已关闭，可能正在等待重连。
    Disconnected,
    /// 连接出错，或重连次数已耗尽。
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        };
        f.write_str(text)
    }
}

/// 快讯对某个标的的影响方向。
///
/// 上游偶尔会给出约定之外的取值，统一归为 `Unknown`，不影响同一条消息里的其他判断。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImpactDirection {
    /// 利好
    Bullish,
    /// 利空
    Bearish,
    /// 中性
    Neutral,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ImpactDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ImpactDirection::Bullish => "bullish",
            ImpactDirection::Bearish => "bearish",
            ImpactDirection::Neutral => "neutral",
            ImpactDirection::Unknown => "unknown",
        };
        f.write_str(text)
    }
}
