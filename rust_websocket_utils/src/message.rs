// rust_websocket_utils/src/message.rs

//! WebSocket 帧的应用层分类与 JSON 解码。
//!
//! 上游快讯源与中继之间传输的是不带信封的 JSON 文本帧，消息类型由 JSON 对象自身的
//! `type` 字段声明。本模块负责两件事：
//! - 把 `tungstenite::Message` 归类为 `WsFrame`，丢弃应用层无需关心的原始 `Frame`；
//! - 把文本帧解码为 `serde_json::Value`，并提取其声明的消息类型。

use crate::error::WsError;
use serde_json::Value;
use std::borrow::Cow;
use tokio_tungstenite::tungstenite::protocol::Message;

/// 正常关闭 (RFC 6455 §7.4.1)。
pub const CLOSE_NORMAL: u16 = 1000;
/// 端点离开，例如服务器正在停机。
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// 连接在没有关闭帧的情况下中断。该代码不会出现在线路上，只用于本地上报。
pub const CLOSE_ABNORMAL: u16 = 1006;
/// 关闭帧没有携带状态码，只用于本地上报。
pub const CLOSE_NO_STATUS: u16 = 1005;

/// 关闭帧中携带的代码与原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// 连接未经关闭握手就中断时使用的关闭信息。
    pub fn abnormal() -> Self {
        Self::new(CLOSE_ABNORMAL, "")
    }
}

/// 应用层关心的 WebSocket 帧。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Text(String),
    Binary(Vec<u8>),
    /// 对端发来的保活探测，调用方应回复携带相同数据的 Pong。
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    /// 对端发起关闭；没有关闭帧负载时为 `None`。
    Close(Option<CloseInfo>),
}

impl WsFrame {
    /// 将底层消息转换为 `WsFrame`。原始 `Frame` 只在写入路径上出现，读取时直接忽略。
    pub fn from_message(message: Message) -> Option<WsFrame> {
        match message {
            Message::Text(text) => Some(WsFrame::Text(text)),
            Message::Binary(bin) => Some(WsFrame::Binary(bin)),
            Message::Ping(data) => Some(WsFrame::Ping(data)),
            Message::Pong(data) => Some(WsFrame::Pong(data)),
            Message::Close(frame) => Some(WsFrame::Close(
                frame.map(|f| CloseInfo::new(u16::from(f.code), f.reason.into_owned())),
            )),
            Message::Frame(_) => None,
        }
    }

    /// 数据帧的文本内容。二进制帧按 UTF-8 宽松解码，控制帧返回 `None`。
    pub fn text_payload(&self) -> Option<Cow<'_, str>> {
        match self {
            WsFrame::Text(text) => Some(Cow::Borrowed(text.as_str())),
            WsFrame::Binary(bin) => Some(String::from_utf8_lossy(bin)),
            _ => None,
        }
    }
}

/// 将文本帧解码为 JSON 值。
pub fn decode_json(text: &str) -> Result<Value, WsError> {
    serde_json::from_str(text)
        .map_err(|e| WsError::DeserializationError(format!("帧内容不是合法的 JSON: {}", e)))
}

/// JSON 消息声明的 `type`。字段缺失、为 `null` 或不是字符串时返回 `None`。
pub fn message_type(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}
