use anyhow::{Context, Result};
use flash_relay::{RelayConfig, RelayService, ShutdownOutcome};
use log::{error, info, LevelFilter};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志记录器，RUST_LOG 可以覆盖默认级别
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
    info!("[主程序] 日志系统已初始化 (env_logger)，默认级别: Info");

    match run().await {
        Ok(ShutdownOutcome::Graceful) => {
            info!("[主程序] 服务已正常退出");
            ExitCode::SUCCESS
        }
        Ok(ShutdownOutcome::TimedOut) => {
            error!("[主程序] 停机超时，强制退出");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("[主程序] 致命错误: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ShutdownOutcome> {
    let config = RelayConfig::from_env().context("加载配置失败")?;
    let relay = RelayService::new(config)
        .bind()
        .await
        .context("启动中继服务失败")?;
    relay
        .serve_until(termination_signal())
        .await
        .context("中继服务异常结束")
}

/// 等待 SIGTERM 或 SIGINT，返回信号名称。两者的处理方式相同。
#[cfg(unix)]
async fn termination_signal() -> String {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            error!("[主程序] 无法注册信号处理器: {}", e);
            return std::future::pending().await;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => "SIGTERM".to_string(),
        _ = sigint.recv() => "SIGINT".to_string(),
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> String {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl-C".to_string(),
        Err(e) => {
            error!("[主程序] 无法监听 Ctrl-C: {}", e);
            std::future::pending().await
        }
    }
}
