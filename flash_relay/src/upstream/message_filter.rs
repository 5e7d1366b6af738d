// flash_relay/src/upstream/message_filter.rs

use common_models::{FLASH_IMPACT_MESSAGE_TYPE, FLASH_MESSAGE_TYPE};
use rust_websocket_utils::message::message_type;
use serde_json::Value;

/// 判断一条上游消息是否需要转发给客户端。
///
/// 只有 `type` 严格等于 `flash` 或 `flash_impact` 的消息会被转发，
/// 比较区分大小写；心跳、系统消息以及没有 `type` 的消息都被丢弃。
pub fn accept(message: &Value) -> bool {
    matches!(
        message_type(message),
        Some(FLASH_MESSAGE_TYPE) | Some(FLASH_IMPACT_MESSAGE_TYPE)
    )
}
