// flash_relay/src/upstream/connection.rs

//! 单次上游连接的后台任务。
//!
//! 每一次连接尝试对应一个任务和一个代次 (`epoch`)。任务把连接过程中发生的一切都
//! 以 [`UpstreamEvent`] 的形式上报给协调器，并且保证最后一条事件总是 `Closed`。

use crate::coordinator::events::{RelayEvent, UpstreamEvent};
use log::{debug, info, warn};
use rust_websocket_utils::client::transport::{self, ClientConnection};
use rust_websocket_utils::message::{CloseInfo, WsFrame, CLOSE_NORMAL, CLOSE_NO_STATUS};
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum UpstreamCommand {
    Close(CloseInfo),
}

/// 协调器持有的、指向一个上游连接任务的句柄。
#[derive(Debug)]
pub struct UpstreamLink {
    epoch: u64,
    commands: mpsc::UnboundedSender<UpstreamCommand>,
}

impl UpstreamLink {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 请求以给定的代码关闭连接。任务已结束时返回 `false`。
    pub fn close(&self, info: CloseInfo) -> bool {
        self.commands.send(UpstreamCommand::Close(info)).is_ok()
    }
}

/// 派生一个新的上游连接任务。
pub fn spawn_upstream_connection(
    url: String,
    epoch: u64,
    events: mpsc::UnboundedSender<RelayEvent>,
) -> UpstreamLink {
    let (commands, command_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_upstream_connection(url, epoch, events, command_rx));
    UpstreamLink { epoch, commands }
}

fn emit(events: &mpsc::UnboundedSender<RelayEvent>, epoch: u64, event: UpstreamEvent) {
    if events.send(RelayEvent::Upstream { epoch, event }).is_err() {
        debug!("[上游连接] 协调器已退出，丢弃代次 {} 的事件", epoch);
    }
}

async fn run_upstream_connection(
    url: String,
    epoch: u64,
    events: mpsc::UnboundedSender<RelayEvent>,
    mut commands: mpsc::UnboundedReceiver<UpstreamCommand>,
) {
    let connected = tokio::select! {
        result = transport::connect_client(&url) => result,
        command = commands.recv() => {
            // 握手还没完成就被要求关闭：放弃这次尝试
            let info = match command {
                Some(UpstreamCommand::Close(info)) => info,
                None => CloseInfo::new(CLOSE_NORMAL, ""),
            };
            info!("[上游连接] 连接建立前收到关闭请求 (代码 {})，放弃本次连接", info.code);
            emit(&events, epoch, UpstreamEvent::Closed(info));
            return;
        }
    };

    let mut connection = match connected {
        Ok(connection) => connection,
        Err(e) => {
            emit(&events, epoch, UpstreamEvent::Error(e.to_string()));
            emit(&events, epoch, UpstreamEvent::Closed(CloseInfo::abnormal()));
            return;
        }
    };

    emit(&events, epoch, UpstreamEvent::Opened);
    let close_info = pump_frames(&mut connection, epoch, &events, &mut commands).await;
    emit(&events, epoch, UpstreamEvent::Closed(close_info.unwrap_or_else(CloseInfo::abnormal)));
}

/// 读取上游帧直到连接结束，返回对端关闭帧中的信息（若有）。
async fn pump_frames(
    connection: &mut ClientConnection,
    epoch: u64,
    events: &mpsc::UnboundedSender<RelayEvent>,
    commands: &mut mpsc::UnboundedReceiver<UpstreamCommand>,
) -> Option<CloseInfo> {
    let mut close_info = None;
    let mut closing = false;

    loop {
        tokio::select! {
            frame = transport::receive_frame(&mut connection.ws_receiver) => match frame {
                Some(Ok(WsFrame::Ping(data))) => {
                    if let Err(e) = connection.send_pong(data).await {
                        warn!("[上游连接] 回复 Pong 失败: {}", e);
                    }
                }
                Some(Ok(WsFrame::Pong(_))) => {}
                Some(Ok(WsFrame::Close(info))) => {
                    close_info = Some(info.unwrap_or_else(|| CloseInfo::new(CLOSE_NO_STATUS, "")));
                }
                Some(Ok(frame)) => {
                    if let Some(text) = frame.text_payload() {
                        emit(events, epoch, UpstreamEvent::Message(text.into_owned()));
                    }
                }
                Some(Err(e)) => {
                    emit(events, epoch, UpstreamEvent::Error(e.to_string()));
                    break;
                }
                None => break,
            },
            command = commands.recv(), if !closing => {
                closing = true;
                let info = match command {
                    Some(UpstreamCommand::Close(info)) => info,
                    None => CloseInfo::new(CLOSE_NORMAL, ""),
                };
                info!("[上游连接] 正在关闭上游连接 (代码 {}: {})", info.code, info.reason);
                if let Err(e) = connection.close(info.code, &info.reason).await {
                    warn!("[上游连接] 发送关闭帧失败: {}", e);
                    break;
                }
            }
        }
    }
    close_info
}
