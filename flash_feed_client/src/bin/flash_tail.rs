// flash_feed_client/src/bin/flash_tail.rs

//! 连接到一个 WebSocket 地址，打印收到的快讯。
//!
//! 用法: `flash_tail <websocket-url>`

use flash_feed_client::tail::render_frame;
use log::{error, info, LevelFilter};
use rust_websocket_utils::client::transport::{connect_client, receive_frame};
use rust_websocket_utils::message::WsFrame;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    let Some(url) = std::env::args().nth(1) else {
        eprintln!("Usage: flash_tail <websocket-url>");
        return ExitCode::FAILURE;
    };

    let mut connection = match connect_client(&url).await {
        Ok(connection) => connection,
        Err(e) => {
            error!("[flash_tail] 错误: {}", e);
            info!("[flash_tail] 连接已关闭");
            return ExitCode::SUCCESS;
        }
    };
    info!("[flash_tail] 已连接到 {}", url);

    while let Some(frame) = receive_frame(&mut connection.ws_receiver).await {
        match frame {
            Ok(WsFrame::Ping(data)) => {
                if let Err(e) = connection.send_pong(data).await {
                    error!("[flash_tail] 错误: {}", e);
                }
            }
            Ok(frame) => {
                if let Some(line) = frame.text_payload().as_deref().and_then(render_frame) {
                    println!("{}", line);
                }
            }
            Err(e) => {
                error!("[flash_tail] 错误: {}", e);
                break;
            }
        }
    }
    info!("[flash_tail] 连接已关闭");
    ExitCode::SUCCESS
}
