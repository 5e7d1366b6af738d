// common_models/src/ws_payloads.rs

//! 中继推送给浏览器客户端的控制类消息负载，以及健康检查报告。
//!
//! 快讯本身（`flash` / `flash_impact`）对中继是不透明的，原样转发；
//! 这里只定义中继自己生成的几种消息。

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// 快讯消息类型。
pub const FLASH_MESSAGE_TYPE: &str = "flash";
/// 快讯影响消息类型。
pub const FLASH_IMPACT_MESSAGE_TYPE: &str = "flash_impact";
/// 连接确认消息类型，每个客户端在接入时收到且仅收到一次。
pub const CONNECTION_MESSAGE_TYPE: &str = "connection";
/// 上游连接状态变更通知的消息类型。
pub const UPSTREAM_STATUS_MESSAGE_TYPE: &str = "upstream_status";

/// 客户端接入后收到的一次性连接确认。
///
/// JSON 形态：`{"type":"connection","status":"connected","upstreamConnected":true}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAckPayload {
    #[serde(rename = "type")]
    pub message_type: String,
    pub status: String,
    /// 发送确认时上游连接是否处于打开状态。
    pub upstream_connected: bool,
}

impl ConnectionAckPayload {
    pub fn new(upstream_connected: bool) -> Self {
        Self {
            message_type: CONNECTION_MESSAGE_TYPE.to_string(),
            status: "connected".to_string(),
            upstream_connected,
        }
    }
}

/// 上游连接打开或关闭时广播给所有客户端的通知。
///
/// JSON 形态：`{"type":"upstream_status","connected":false}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UpstreamStatusPayload {
    #[serde(rename = "type")]
    pub message_type: String,
    pub connected: bool,
}

impl UpstreamStatusPayload {
    pub fn new(connected: bool) -> Self {
        Self {
            message_type: UPSTREAM_STATUS_MESSAGE_TYPE.to_string(),
            connected,
        }
    }
}

/// `GET /health` 的响应体。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    /// ISO-8601 UTC 时间，精确到毫秒，例如 `2024-05-01T08:00:00.123Z`。
    pub timestamp: String,
    pub upstream_connected: bool,
    pub client_count: usize,
}

impl HealthReport {
    /// 以当前时间生成一份 `status: "ok"` 的报告。
    pub fn ok(upstream_connected: bool, client_count: usize) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            upstream_connected,
            client_count,
        }
    }
}
