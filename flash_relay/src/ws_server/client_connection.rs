// flash_relay/src/ws_server/client_connection.rs

//! 浏览器客户端的 WebSocket 接入。
//!
//! 每个连接由一个任务独占套接字的读写两端：一边读取客户端发来的帧，
//! 一边执行协调器经由 [`ClientLink`] 发来的命令。强制断开优先于一切，
//! 包括正在挂起的发送。

use crate::coordinator::events::RelayEvent;
use crate::coordinator::RelayHandle;
use crate::state::AppState;
use crate::ws_server::client_session::{ClientCommand, ClientHandle, ClientLink, ReadyState};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rust_websocket_utils::message::CloseInfo;
use std::net::SocketAddr;
use tokio::sync::{mpsc, oneshot};

/// `GET /` 与 `GET /ws` 的升级处理器。
pub async fn ws_upgrade_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| run_client_connection(socket, addr, relay))
}

fn close_message(info: CloseInfo) -> Message {
    Message::Close(Some(CloseFrame {
        code: info.code,
        reason: info.reason.into(),
    }))
}

/// 驱动一个客户端连接直到其结束。
pub async fn run_client_connection(mut socket: WebSocket, addr: SocketAddr, relay: RelayHandle) {
    let (link, mut commands) = ClientLink::channel();
    let (registered_tx, registered_rx) = oneshot::channel();
    let connected = RelayEvent::ClientConnected {
        addr,
        link: link.clone(),
        registered: registered_tx,
    };
    if !relay.send(connected) {
        warn!("[服务器] 中继协调器已退出，丢弃来自 {} 的连接", addr);
        return;
    }

    let handle = match registered_rx.await {
        Ok(handle) => handle,
        Err(_) => {
            // 停机期间被拒绝：协调器已排入一个关闭命令
            if let Ok(ClientCommand::Close(info)) = commands.try_recv() {
                let _ = socket.send(close_message(info)).await;
            }
            link.set_ready_state(ReadyState::Closed);
            return;
        }
    };

    let (close, error) = pump_client(socket, handle, &link, &mut commands, &relay).await;
    link.set_ready_state(ReadyState::Closed);

    if let Some(error) = error {
        relay.send(RelayEvent::ClientError { handle, error });
    }
    relay.send(RelayEvent::ClientClosed { handle, close });
}

async fn pump_client(
    socket: WebSocket,
    handle: ClientHandle,
    link: &ClientLink,
    commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
    relay: &RelayHandle,
) -> (Option<CloseInfo>, Option<String>) {
    let (mut sink, mut stream) = socket.split();
    let mut close = None;

    loop {
        let outgoing = tokio::select! {
            biased;
            _ = link.terminated() => break,
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Pong(_))) => {
                        relay.send(RelayEvent::ClientPong { handle });
                    }
                    Some(Ok(Message::Close(frame))) => {
                        // 对端发起关闭，底层会自动回复关闭帧，之后读取返回 None
                        link.set_ready_state(ReadyState::Closing);
                        close = frame.map(|f| CloseInfo::new(f.code, f.reason.into_owned()));
                    }
                    Some(Ok(_)) => {
                        debug!("[服务器] 忽略客户端 {} 发来的消息", handle);
                    }
                    Some(Err(e)) => return (close, Some(e.to_string())),
                    None => return (close, None),
                }
                continue;
            }
            command = commands.recv() => match command {
                Some(ClientCommand::Text(payload)) => Message::Text(payload.to_string()),
                Some(ClientCommand::Ping) => Message::Ping(Vec::new()),
                Some(ClientCommand::Close(info)) => close_message(info),
                None => return (close, None),
            },
        };

        let is_close = matches!(outgoing, Message::Close(_));
        // 客户端不读取时发送会一直挂起，强制断开必须能打断它
        let sent = tokio::select! {
            biased;
            _ = link.terminated() => break,
            sent = sink.send(outgoing) => sent,
        };
        if let Err(e) = sent {
            debug!("[服务器] 向客户端 {} 发送消息失败: {}", handle, e);
            if is_close {
                return (close, None);
            }
        }
    }

    info!("[服务器] 强制断开客户端 {}", handle);
    (close, None)
}
