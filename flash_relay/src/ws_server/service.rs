// flash_relay/src/ws_server/service.rs

//! 中继服务的启动、运行与优雅停机。
//!
//! 启动顺序：绑定监听端口，启动心跳，连接上游。停机时由协调器按顺序关闭上游与客户端，
//! 协调器退出后再关闭 HTTP 监听。

use crate::api;
use crate::config::RelayConfig;
use crate::coordinator::{RelayCoordinator, RelayHandle};
use crate::error::AppError;
use crate::state::AppState;
use log::{error, info};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

/// 停机的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// 所有连接都在时限内关闭。
    Graceful,
    /// 超过停机时限，仍有连接未关闭。调用方应以非零状态退出进程。
    TimedOut,
}

pub struct RelayService {
    config: RelayConfig,
}

impl RelayService {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// 绑定监听端口并创建协调器。此时还没有任何连接被接受或发起。
    pub async fn bind(self) -> Result<BoundRelay, AppError> {
        let listen_addr = self.config.bind_address();
        let listener = TcpListener::bind(&listen_addr)
            .await
            .map_err(|e| AppError::WebSocketService(format!("无法绑定监听地址 {}: {}", listen_addr, e)))?;
        let (coordinator, handle) = RelayCoordinator::new(&self.config);
        Ok(BoundRelay {
            listener,
            coordinator,
            handle,
            shutdown_timeout: self.config.shutdown_timeout(),
        })
    }
}

/// 已绑定端口、尚未开始服务的中继。
pub struct BoundRelay {
    listener: TcpListener,
    coordinator: RelayCoordinator,
    handle: RelayHandle,
    shutdown_timeout: Duration,
}

impl BoundRelay {
    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// 运行中继直到协调器完成停机，然后关闭 HTTP 监听。
    ///
    /// 停机需要通过 [`RelayHandle::shutdown`] 触发。
    pub async fn serve(self) -> Result<(), AppError> {
        let BoundRelay { listener, coordinator, handle, .. } = self;
        let local_addr = listener.local_addr()?;
        let router = api::build_router(AppState::new(handle));

        let (stop_http_tx, stop_http_rx) = oneshot::channel::<()>();
        let mut http_server = tokio::spawn(async move {
            axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = stop_http_rx.await;
                })
                .await
        });

        info!("[服务器] WebSocket 中继正在监听 ws://{}", local_addr);
        info!("[服务器] 健康检查: http://{}/health", local_addr);

        tokio::select! {
            _ = coordinator.run() => {}
            result = &mut http_server => {
                // HTTP 服务先于协调器结束，只可能是出错
                return match result {
                    Ok(Ok(())) => Err(AppError::WebSocketService("HTTP 服务意外结束".to_string())),
                    Ok(Err(e)) => Err(AppError::Io(e)),
                    Err(e) => Err(AppError::WebSocketService(format!("HTTP 服务任务异常结束: {}", e))),
                };
            }
        }

        let _ = stop_http_tx.send(());
        match http_server.await {
            Ok(Ok(())) => {
                info!("[服务器] HTTP 服务已关闭");
                Ok(())
            }
            Ok(Err(e)) => Err(AppError::Io(e)),
            Err(e) => Err(AppError::WebSocketService(format!("HTTP 服务任务异常结束: {}", e))),
        }
    }

    /// 运行中继，直到 `shutdown_signal` 完成，然后在停机时限内等待有序关闭。
    ///
    /// # Arguments
    /// * `shutdown_signal` - 完成时给出停机原因，例如收到的信号名称。
    ///
    /// # Returns
    /// * `Ok(ShutdownOutcome::Graceful)` - 停机在时限内完成。
    /// * `Ok(ShutdownOutcome::TimedOut)` - 超过时限；剩余的连接任务不会再被等待。
    pub async fn serve_until<F>(self, shutdown_signal: F) -> Result<ShutdownOutcome, AppError>
    where
        F: Future<Output = String>,
    {
        let handle = self.handle();
        let shutdown_timeout = self.shutdown_timeout;
        let mut serving = Box::pin(self.serve());

        let reason = tokio::select! {
            reason = shutdown_signal => reason,
            result = &mut serving => {
                result?;
                return Ok(ShutdownOutcome::Graceful);
            }
        };

        handle.shutdown(reason);
        match timeout(shutdown_timeout, serving).await {
            Ok(result) => {
                result?;
                info!("[服务器] 优雅停机完成");
                Ok(ShutdownOutcome::Graceful)
            }
            Err(_) => {
                error!("[服务器] 优雅停机超时 ({:?})，放弃等待剩余连接", shutdown_timeout);
                Ok(ShutdownOutcome::TimedOut)
            }
        }
    }
}
