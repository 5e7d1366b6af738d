// flash_feed_client/src/service.rs

//! 订阅客户端服务。
//!
//! 连接、重连计时和快讯列表都由一个后台任务独占；调用方通过 [`FeedClientService`]
//! 发送命令，通过事件通道接收状态变化与最新的快讯列表。

use crate::config::FeedClientConfig;
use crate::error::FeedClientError;
use crate::news_feed::NewsFeed;
use crate::reconnect::ReconnectPolicy;
use chrono::Utc;
use common_models::ws_payloads::UPSTREAM_STATUS_MESSAGE_TYPE;
use common_models::{
    ConnectionStatus, MergedNewsItem, NewsMessage, UpstreamStatusPayload, FLASH_IMPACT_MESSAGE_TYPE,
    FLASH_MESSAGE_TYPE,
};
use log::{debug, error, info, warn};
use rust_websocket_utils::client::transport::{self, ClientConnection};
use rust_websocket_utils::message::{decode_json, message_type, WsFrame, CLOSE_NORMAL};
use rust_websocket_utils::WsError;
use serde_json::Value;
use std::future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};

/// 重连次数耗尽时上报的错误信息。
pub const MAX_RECONNECT_ERROR: &str = "Max reconnection attempts reached";
/// 连接出错时上报的错误信息。
pub const CONNECTION_ERROR: &str = "Connection error";

/// 后台任务发给调用方的事件。
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Status(ConnectionStatus),
    /// 快讯列表发生变化后的完整副本，最新的在前。
    NewsUpdated(Vec<MergedNewsItem>),
    /// 中继报告的上游连接状态。
    UpstreamStatus(bool),
    Error(String),
}

#[derive(Debug)]
enum FeedCommand {
    Reconnect,
    Disconnect,
    ClearMessages,
    Shutdown,
}

/// 订阅客户端的控制句柄。
#[derive(Debug)]
pub struct FeedClientService {
    commands: mpsc::UnboundedSender<FeedCommand>,
    task: JoinHandle<()>,
}

impl FeedClientService {
    /// 校验配置并启动后台任务，任务会立即尝试连接。
    ///
    /// # Returns
    /// * `Ok((service, events))` - 控制句柄与事件接收端。
    /// * `Err(FeedClientError::ConfigError)` - 配置无效。
    pub fn start(
        config: FeedClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FeedEvent>), FeedClientError> {
        config
            .validate()
            .map_err(|e| FeedClientError::ConfigError(format!("{:#}", e)))?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let worker = FeedWorker::new(config, events_tx);
        let task = tokio::spawn(worker.run(command_rx));
        Ok((Self { commands, task }, events_rx))
    }

    /// 清零重连计数，关闭当前连接并立即重新连接。
    pub fn reconnect(&self) -> Result<(), FeedClientError> {
        self.send(FeedCommand::Reconnect)
    }

    /// 取消待触发的重连并关闭连接。之后只有 `reconnect` 会再次连接。
    pub fn disconnect(&self) -> Result<(), FeedClientError> {
        self.send(FeedCommand::Disconnect)
    }

    pub fn clear_messages(&self) -> Result<(), FeedClientError> {
        self.send(FeedCommand::ClearMessages)
    }

    /// 关闭连接并等待后台任务结束。
    pub async fn shutdown(self) -> Result<(), FeedClientError> {
        let _ = self.commands.send(FeedCommand::Shutdown);
        self.task.await.map_err(|_| FeedClientError::ServiceStopped)
    }

    fn send(&self, command: FeedCommand) -> Result<(), FeedClientError> {
        self.commands
            .send(command)
            .map_err(|_| FeedClientError::ServiceStopped)
    }
}

struct FeedWorker {
    relay_url: String,
    feed: NewsFeed,
    policy: ReconnectPolicy,
    connection: Option<ClientConnection>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    events: mpsc::UnboundedSender<FeedEvent>,
}

impl FeedWorker {
    fn new(config: FeedClientConfig, events: mpsc::UnboundedSender<FeedEvent>) -> Self {
        Self {
            policy: ReconnectPolicy::new(
                config.initial_reconnect_delay(),
                config.max_reconnect_delay(),
                config.max_reconnect_attempts,
            ),
            feed: NewsFeed::new(config.max_messages),
            relay_url: config.relay_url,
            connection: None,
            reconnect_timer: None,
            events,
        }
    }

    fn emit(&self, event: FeedEvent) {
        if self.events.send(event).is_err() {
            debug!("[订阅客户端] 事件接收端已关闭");
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<FeedCommand>) {
        // 握手期间收到的、打断了连接尝试的命令
        let mut interrupted = self.connect(&mut commands).await;
        loop {
            let command = match interrupted.take() {
                Some(command) => Some(command),
                None => tokio::select! {
                    command = commands.recv() => command,
                    frame = next_frame(&mut self.connection) => {
                        self.handle_frame(frame).await;
                        continue;
                    }
                    _ = wait_timer(&mut self.reconnect_timer) => {
                        self.reconnect_timer = None;
                        interrupted = self.connect(&mut commands).await;
                        continue;
                    }
                },
            };

            match command {
                Some(FeedCommand::Reconnect) => {
                    info!("[订阅客户端] 手动重连");
                    self.reconnect_timer = None;
                    self.policy.reset();
                    self.close_connection().await;
                    interrupted = self.connect(&mut commands).await;
                }
                Some(FeedCommand::Disconnect) => {
                    self.reconnect_timer = None;
                    if self.close_connection().await {
                        self.emit(FeedEvent::Status(ConnectionStatus::Disconnected));
                    }
                }
                Some(FeedCommand::ClearMessages) => self.clear_messages(),
                Some(FeedCommand::Shutdown) | None => {
                    self.close_connection().await;
                    break;
                }
            }
        }
        info!("[订阅客户端] 后台任务已退出");
    }

    fn clear_messages(&mut self) {
        self.feed.clear();
        self.emit(FeedEvent::NewsUpdated(Vec::new()));
    }

    /// 发起一次连接。握手期间仍然处理命令：清空列表就地执行，
    /// 重连、断开和退出会放弃本次握手，并把该命令交还给调用方。
    async fn connect(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<FeedCommand>,
    ) -> Option<FeedCommand> {
        if self.connection.is_some() {
            return None;
        }
        self.emit(FeedEvent::Status(ConnectionStatus::Connecting));

        let relay_url = self.relay_url.clone();
        let handshake = transport::connect_client(&relay_url);
        tokio::pin!(handshake);
        let result = loop {
            tokio::select! {
                result = &mut handshake => break result,
                command = commands.recv() => match command {
                    Some(FeedCommand::ClearMessages) => self.clear_messages(),
                    other => {
                        info!("[订阅客户端] 握手尚未完成，放弃本次连接");
                        self.emit(FeedEvent::Status(ConnectionStatus::Disconnected));
                        return Some(other.unwrap_or(FeedCommand::Shutdown));
                    }
                },
            }
        };

        match result {
            Ok(connection) => {
                info!("[订阅客户端] 已连接到中继 {}", self.relay_url);
                self.connection = Some(connection);
                self.policy.reset();
                self.emit(FeedEvent::Status(ConnectionStatus::Connected));
            }
            Err(e) => {
                warn!("[订阅客户端] 连接中继失败: {}", e);
                self.emit(FeedEvent::Status(ConnectionStatus::Error));
                self.emit(FeedEvent::Error(CONNECTION_ERROR.to_string()));
                self.on_closed();
            }
        }
        None
    }

    /// 关闭当前连接，返回之前是否存在连接。
    async fn close_connection(&mut self) -> bool {
        match self.connection.take() {
            Some(mut connection) => {
                if let Err(e) = connection.close(CLOSE_NORMAL, "").await {
                    debug!("[订阅客户端] 发送关闭帧失败: {}", e);
                }
                true
            }
            None => false,
        }
    }

    fn on_closed(&mut self) {
        self.connection = None;
        self.emit(FeedEvent::Status(ConnectionStatus::Disconnected));
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_timer.is_some() {
            return;
        }
        match self.policy.next_delay() {
            Some(delay) => {
                info!(
                    "[订阅客户端] 将在 {}ms 后进行第 {} 次重连",
                    delay.as_millis(),
                    self.policy.attempts()
                );
                self.reconnect_timer = Some(Box::pin(sleep(delay)));
            }
            None => {
                error!("[订阅客户端] 重连次数已耗尽，停止重连");
                self.emit(FeedEvent::Error(MAX_RECONNECT_ERROR.to_string()));
            }
        }
    }

    async fn handle_frame(&mut self, frame: Option<Result<WsFrame, WsError>>) {
        match frame {
            Some(Ok(WsFrame::Ping(data))) => {
                if let Some(connection) = self.connection.as_mut() {
                    if let Err(e) = connection.send_pong(data).await {
                        warn!("[订阅客户端] 回复 Pong 失败: {}", e);
                    }
                }
            }
            Some(Ok(WsFrame::Pong(_))) | Some(Ok(WsFrame::Close(_))) => {}
            Some(Ok(frame)) => {
                if let Some(text) = frame.text_payload() {
                    self.handle_text(&text);
                }
            }
            Some(Err(e)) => {
                warn!("[订阅客户端] 连接出错: {}", e);
                self.emit(FeedEvent::Status(ConnectionStatus::Error));
                self.emit(FeedEvent::Error(CONNECTION_ERROR.to_string()));
                self.on_closed();
            }
            None => {
                info!("[订阅客户端] 与中继的连接已关闭");
                self.on_closed();
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        // 非 JSON 内容直接忽略
        let Ok(value) = decode_json(text) else {
            debug!("[订阅客户端] 忽略非 JSON 消息");
            return;
        };
        let kind = message_type(&value).map(str::to_owned);
        match kind.as_deref() {
            Some(FLASH_MESSAGE_TYPE) | Some(FLASH_IMPACT_MESSAGE_TYPE) => self.apply_news(value),
            Some(UPSTREAM_STATUS_MESSAGE_TYPE) => {
                match serde_json::from_value::<UpstreamStatusPayload>(value) {
                    Ok(status) => self.emit(FeedEvent::UpstreamStatus(status.connected)),
                    Err(e) => debug!("[订阅客户端] 上游状态消息格式错误: {}", e),
                }
            }
            other => debug!("[订阅客户端] 忽略类型为 {:?} 的消息", other),
        }
    }

    fn apply_news(&mut self, value: Value) {
        match serde_json::from_value::<NewsMessage>(value) {
            Ok(message) => {
                if self.feed.apply(message, Utc::now().timestamp_millis()) {
                    self.emit(FeedEvent::NewsUpdated(self.feed.snapshot()));
                }
            }
            Err(e) => warn!("[订阅客户端] 快讯格式错误: {}", e),
        }
    }
}

async fn next_frame(connection: &mut Option<ClientConnection>) -> Option<Result<WsFrame, WsError>> {
    match connection.as_mut() {
        Some(connection) => transport::receive_frame(&mut connection.ws_receiver).await,
        None => future::pending().await,
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(timer) => timer.as_mut().await,
        None => future::pending::<()>().await,
    }
}
