// flash_feed_client/src/tail.rs

//! `flash_tail` 的输出格式。

use common_models::{FLASH_IMPACT_MESSAGE_TYPE, FLASH_MESSAGE_TYPE};
use rust_websocket_utils::message::{decode_json, message_type};

/// 把一个文本帧渲染为要打印的内容。
///
/// 快讯与快讯影响以缩进两格的 JSON 输出；其他类型的 JSON 不输出；
/// 不是 JSON 的内容原样输出。
pub fn render_frame(text: &str) -> Option<String> {
    match decode_json(text) {
        Ok(value) => match message_type(&value) {
            Some(FLASH_MESSAGE_TYPE) | Some(FLASH_IMPACT_MESSAGE_TYPE) => {
                serde_json::to_string_pretty(&value).ok()
            }
            _ => None,
        },
        Err(_) => Some(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_is_pretty_printed_in_original_key_order() {
        let rendered = render_frame(r#"{"type":"flash","data":{"id":"n1"}}"#).unwrap();
        assert_eq!(rendered, "{\n  \"type\": \"flash\",\n  \"data\": {\n    \"id\": \"n1\"\n  }\n}");
    }

    #[test]
    fn test_other_json_is_skipped_and_raw_text_is_kept() {
        assert_eq!(render_frame(r#"{"type":"connection","status":"connected"}"#), None);
        assert_eq!(render_frame(r#"{"type":"upstream_status","connected":true}"#), None);
        assert_eq!(render_frame("hello relay").as_deref(), Some("hello relay"));
    }
}
