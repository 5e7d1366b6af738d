// rust_websocket_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层核心逻辑。
//!
//! 提供建立与服务器的连接、接收并分类帧、发送 Pong / 关闭帧等功能。

use crate::error::WsError;
use crate::message::WsFrame;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use log::{debug, error, info};
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, Message},
    tungstenite::Error as TungsteniteError,
    WebSocketStream,
};
use url::Url;

/// `ClientWsStream` 类型别名，代表一个可能经过 TLS 加密的 TCP WebSocket 流。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 一个活动的客户端 WebSocket 连接，已拆分为发送端与接收端。
///
/// 两端分开持有，便于调用方在同一个 `select!` 里同时等待新帧和本地发来的命令。
pub struct ClientConnection {
    /// 向服务器发送消息的 `Sink`。
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    /// 从服务器接收消息的 `Stream`，配合 [`receive_frame`] 使用。
    pub ws_receiver: SplitStream<ClientWsStream>,
}

impl ClientConnection {
    /// 回复对端的 Ping，负载与 Ping 帧相同。
    pub async fn send_pong(&mut self, data: Vec<u8>) -> Result<(), WsError> {
        self.ws_sender.send(Message::Pong(data)).await?;
        Ok(())
    }

    /// 以给定的关闭代码与原因发起关闭握手。
    ///
    /// 发送关闭帧后，调用方应继续通过 [`receive_frame`] 读取，直到其返回 `None`，
    /// 以完成握手并让对端的关闭帧被消费。
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<(), WsError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        match self.ws_sender.send(Message::Close(Some(frame))).await {
            Ok(()) => Ok(()),
            // 对端已先行关闭时，本地的关闭请求不算错误
            Err(TungsteniteError::ConnectionClosed) | Err(TungsteniteError::AlreadyClosed) => Ok(()),
            Err(e) => Err(WsError::WebSocketProtocolError(e)),
        }
    }
}

/// 校验 WebSocket URL：必须可解析，且 scheme 为 `ws` 或 `wss`。
pub fn parse_ws_url(url_str: &str) -> Result<Url, WsError> {
    let parsed_url = Url::parse(url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;
    match parsed_url.scheme() {
        "ws" | "wss" => Ok(parsed_url),
        other => Err(WsError::InvalidUrl(format!(
            "WebSocket URL '{}' 的 scheme 必须是 ws 或 wss，实际为 '{}'",
            url_str, other
        ))),
    }
}

/// 异步连接到指定的 WebSocket 服务器。
///
/// 连接与握手成功后，把返回的流拆分为发送端和接收端并封装为 `ClientConnection`。
///
/// # Arguments
/// * `url_str` - 完整的 WebSocket URL，例如 `ws://127.0.0.1:3001` 或 `wss://example.com/socket`。
///
/// # Returns
/// * `Result<ClientConnection, WsError>` - URL 无效时返回 `WsError::InvalidUrl`，
///   网络或握手失败时返回 `WsError::WebSocketProtocolError`。
pub async fn connect_client(url_str: &str) -> Result<ClientConnection, WsError> {
    let parsed_url = parse_ws_url(url_str)?;
    info!("客户端：开始尝试连接到 WebSocket 服务器，URL: {}", url_str);

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("客户端：已成功连接到 {} (HTTP 状态码: {})", url_str, response.status());
            debug!("客户端：WebSocket 连接响应头: {:?}", response.headers());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("客户端：连接到 {} 失败，错误: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// 从接收流中读取下一个应用层帧。
///
/// 与只关心业务消息的读取不同，这里会把 Ping / Pong / Close 也交给调用方，
/// 因为上游连接需要显式回复 Ping，并记录关闭代码。
///
/// # Returns
/// * `Some(Ok(frame))` - 收到一个帧。
/// * `Some(Err(e))` - 读取时发生协议或 I/O 错误，连接应视为已失效。
/// * `None` - 连接已关闭，流已结束。
pub async fn receive_frame(
    ws_receiver: &mut SplitStream<ClientWsStream>,
) -> Option<Result<WsFrame, WsError>> {
    loop {
        match ws_receiver.next().await {
            Some(Ok(message)) => {
                if let Some(frame) = WsFrame::from_message(message) {
                    break Some(Ok(frame));
                }
                debug!("客户端：收到底层原始 Frame，已跳过。");
            }
            Some(Err(TungsteniteError::ConnectionClosed)) | Some(Err(TungsteniteError::AlreadyClosed)) => {
                debug!("客户端：连接已关闭 (ConnectionClosed / AlreadyClosed)。");
                break None;
            }
            Some(Err(e)) => {
                error!("客户端：从 WebSocket 流接收消息时发生底层错误: {}", e);
                break Some(Err(WsError::WebSocketProtocolError(e)));
            }
            None => {
                debug!("客户端：WebSocket 接收流已结束。");
                break None;
            }
        }
    }
}
