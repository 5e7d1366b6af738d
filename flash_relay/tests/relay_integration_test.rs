// flash_relay/tests/relay_integration_test.rs

//! 端到端测试：本地假上游 + 真实的中继服务 + tokio-tungstenite 客户端。

use flash_relay::{AppError, RelayConfig, RelayHandle, RelayService, ShutdownOutcome};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, connect_async, MaybeTlsStream, WebSocketStream};

type UpstreamConn = WebSocketStream<TcpStream>;
type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 接受中继连接的本地假上游。
struct FakeUpstream {
    url: String,
    accepted: mpsc::UnboundedReceiver<UpstreamConn>,
}

impl FakeUpstream {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (tx, accepted) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_async(stream).await {
                    if tx.send(ws).is_err() {
                        break;
                    }
                }
            }
        });
        Self { url, accepted }
    }

    async fn next_connection(&mut self) -> UpstreamConn {
        timeout(WAIT, self.accepted.recv())
            .await
            .expect("等待中继连接上游超时")
            .expect("假上游已停止")
    }

    async fn assert_no_connection_within(&mut self, window: Duration) {
        assert!(timeout(window, self.accepted.recv()).await.is_err(), "出现了意外的上游连接");
    }
}

struct RunningRelay {
    addr: SocketAddr,
    handle: RelayHandle,
    stop: Option<oneshot::Sender<String>>,
    task: JoinHandle<Result<ShutdownOutcome, AppError>>,
}

impl RunningRelay {
    async fn start(upstream_url: &str, heartbeat_ms: u64, shutdown_timeout_ms: u64) -> Self {
        let mut config = RelayConfig::new(upstream_url);
        config.host = "127.0.0.1".to_string();
        config.port = 0;
        config.heartbeat_interval_ms = heartbeat_ms;
        config.reconnect_delay_ms = 100;
        config.shutdown_timeout_ms = shutdown_timeout_ms;

        let relay = RelayService::new(config).bind().await.unwrap();
        let addr = relay.local_addr().unwrap();
        let handle = relay.handle();
        let (stop_tx, stop_rx) = oneshot::channel::<String>();
        let task = tokio::spawn(relay.serve_until(async move {
            stop_rx.await.unwrap_or_else(|_| "test dropped".to_string())
        }));
        Self {
            addr,
            handle,
            stop: Some(stop_tx),
            task,
        }
    }

    async fn connect(&self, path: &str) -> Client {
        let (client, _) = connect_async(format!("ws://{}{}", self.addr, path)).await.unwrap();
        client
    }

    async fn shutdown(mut self) -> ShutdownOutcome {
        if let Some(stop) = self.stop.take() {
            stop.send("SIGTERM".to_string()).unwrap();
        }
        timeout(WAIT, self.task).await.unwrap().unwrap().unwrap()
    }
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    wait_within(what, WAIT, condition).await
}

async fn wait_within(what: &str, window: Duration, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + window;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "等待条件超时: {}", what);
        sleep(Duration::from_millis(10)).await;
    }
}

/// 读取下一条文本消息并解析为 JSON，跳过控制帧。
async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = timeout(WAIT, client.next())
            .await
            .expect("等待消息超时")
            .expect("连接意外结束")
            .expect("读取失败");
        match message {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("预期文本消息，实际为 {:?}", other),
        }
    }
}

/// 在后台持续读取上游连接，使中继发起的关闭握手能够完成。
fn keep_reading(mut conn: UpstreamConn) -> JoinHandle<()> {
    tokio::spawn(async move { while let Some(Ok(_)) = conn.next().await {} })
}

/// 读取直到收到关闭帧，然后继续读取以完成关闭握手。
async fn expect_close<S>(ws: &mut WebSocketStream<S>) -> CloseFrame<'static>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let frame = loop {
        let message = timeout(WAIT, ws.next())
            .await
            .expect("等待关闭帧超时")
            .expect("连接在关闭帧之前结束")
            .expect("读取失败");
        if let Message::Close(frame) = message {
            break frame.expect("关闭帧缺少状态码");
        }
    };
    while let Ok(Some(Ok(_))) = timeout(WAIT, ws.next()).await {}
    frame
}

#[tokio::test]
async fn test_flash_messages_fan_out_to_every_client() {
    init_test_logger();
    let mut upstream = FakeUpstream::start().await;
    let relay = RunningRelay::start(&upstream.url, 60_000, 5_000).await;
    let mut upstream_conn = upstream.next_connection().await;
    wait_until("上游已连接", || relay.handle.snapshot().upstream_connected()).await;

    let mut clients = vec![
        relay.connect("/").await,
        relay.connect("/ws").await,
        relay.connect("/ws").await,
    ];
    for client in clients.iter_mut() {
        assert_eq!(
            next_json(client).await,
            json!({"type": "connection", "status": "connected", "upstreamConnected": true})
        );
    }
    wait_until("三个客户端已注册", || relay.handle.snapshot().client_count() == 3).await;

    let flash = json!({
        "type": "flash",
        "data": {
            "id": "n-1001",
            "time": "2024-05-01 08:00:00",
            "content": {"items": [{"content": "央行宣布降准 0.5 个百分点"}]},
            "remarks": []
        }
    });
    let impact = json!({
        "type": "flash_impact",
        "data": {"id": "n-1001", "impact": [{"symbol": "000001.SH", "impact": "bullish"}]}
    });

    upstream_conn.send(Message::Text(json!({"type": "heartbeat"}).to_string())).await.unwrap();
    upstream_conn.send(Message::Text(flash.to_string())).await.unwrap();
    upstream_conn.send(Message::Text("not json".to_string())).await.unwrap();
    upstream_conn.send(Message::Text(json!({"data": {"id": "x"}}).to_string())).await.unwrap();
    upstream_conn.send(Message::Binary(impact.to_string().into_bytes())).await.unwrap();

    for client in clients.iter_mut() {
        assert_eq!(next_json(client).await, flash);
        assert_eq!(next_json(client).await, impact);
    }
    wait_until("最近一次广播送达三个客户端", || {
        relay.handle.snapshot().last_broadcast_count() == 3
    })
    .await;
    assert_eq!(relay.handle.snapshot().total_deliveries(), 6);

    // 停机：客户端收到 1001，上游收到 1000，之后不再重连
    let upstream_closed = tokio::spawn(async move { expect_close(&mut upstream_conn).await });
    let mut stop = relay.stop;
    stop.take().unwrap().send("SIGTERM".to_string()).unwrap();
    for client in clients.iter_mut() {
        let frame = expect_close(client).await;
        assert_eq!(u16::from(frame.code), 1001);
        assert_eq!(frame.reason, "Server shutting down");
    }
    let upstream_frame = upstream_closed.await.unwrap();
    assert_eq!(u16::from(upstream_frame.code), 1000);

    let outcome = timeout(WAIT, relay.task).await.unwrap().unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Graceful);
    upstream.assert_no_connection_within(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_upstream_drop_is_announced_and_reconnected() {
    init_test_logger();
    let mut upstream = FakeUpstream::start().await;
    let relay = RunningRelay::start(&upstream.url, 60_000, 5_000).await;
    let upstream_conn = upstream.next_connection().await;
    wait_until("上游已连接", || relay.handle.snapshot().upstream_connected()).await;

    let mut client = relay.connect("/ws").await;
    assert_eq!(next_json(&mut client).await["upstreamConnected"], json!(true));

    // 不经关闭握手直接断开
    drop(upstream_conn);
    assert_eq!(
        next_json(&mut client).await,
        json!({"type": "upstream_status", "connected": false})
    );

    let mut reconnected = upstream.next_connection().await;
    assert_eq!(
        next_json(&mut client).await,
        json!({"type": "upstream_status", "connected": true})
    );
    upstream.assert_no_connection_within(Duration::from_millis(300)).await;

    // 新连接上的快讯照常转发
    let flash = json!({"type": "flash", "data": {"id": "n-2"}});
    reconnected.send(Message::Text(flash.to_string())).await.unwrap();
    assert_eq!(next_json(&mut client).await, flash);

    let reader = tokio::spawn(async move { expect_close(&mut client).await });
    let upstream_closed = tokio::spawn(async move { expect_close(&mut reconnected).await });
    assert_eq!(relay.shutdown().await, ShutdownOutcome::Graceful);
    assert_eq!(u16::from(reader.await.unwrap().code), 1001);
    assert_eq!(u16::from(upstream_closed.await.unwrap().code), 1000);
}

#[tokio::test]
async fn test_client_that_never_answers_pings_is_evicted() {
    init_test_logger();
    let mut upstream = FakeUpstream::start().await;
    let relay = RunningRelay::start(&upstream.url, 200, 5_000).await;
    let upstream_reader = keep_reading(upstream.next_connection().await);

    // 持续读取的客户端会自动回复 Pong
    let mut responsive = relay.connect("/ws").await;
    next_json(&mut responsive).await;
    let responsive_reader = tokio::spawn(async move {
        let mut frames = 0usize;
        while let Some(Ok(message)) = responsive.next().await {
            if message.is_close() {
                break;
            }
            frames += 1;
        }
        frames
    });

    // 这个客户端在收到确认后不再读取，也就不会回复任何 Ping
    let mut silent = relay.connect("/ws").await;
    next_json(&mut silent).await;
    wait_until("两个客户端已注册", || relay.handle.snapshot().client_count() == 2).await;

    wait_until("无响应的客户端被移除", || relay.handle.snapshot().client_count() == 1).await;
    sleep(Duration::from_millis(600)).await;
    assert_eq!(relay.handle.snapshot().client_count(), 1);

    // 被强制断开的连接不会收到关闭帧
    let mut saw_close = false;
    while let Ok(Some(Ok(message))) = timeout(WAIT, silent.next()).await {
        if message.is_close() {
            saw_close = true;
        }
    }
    assert!(!saw_close);

    assert_eq!(relay.shutdown().await, ShutdownOutcome::Graceful);
    assert!(responsive_reader.await.unwrap() > 0);
    upstream_reader.await.unwrap();
}

#[tokio::test]
async fn test_evicted_client_does_not_receive_its_backlog() {
    init_test_logger();
    const BACKLOG: usize = 400;
    let mut upstream = FakeUpstream::start().await;
    let relay = RunningRelay::start(&upstream.url, 3_000, 5_000).await;
    let mut upstream_conn = upstream.next_connection().await;
    wait_until("上游已连接", || relay.handle.snapshot().upstream_connected()).await;

    // 读完确认后就不再读取
    let mut stalled = relay.connect("/ws").await;
    next_json(&mut stalled).await;
    wait_until("客户端已注册", || relay.handle.snapshot().client_count() == 1).await;

    // 每条约 64 KiB，总量远超套接字缓冲区，发送必然挂起
    let padding = "x".repeat(64 * 1024);
    for i in 0..BACKLOG {
        let flash = json!({"type": "flash", "data": {"id": format!("n-{}", i), "content": padding}});
        upstream_conn.send(Message::Text(flash.to_string())).await.unwrap();
    }
    let upstream_reader = keep_reading(upstream_conn);
    wait_until("积压的快讯全部进入发送队列", || {
        relay.handle.snapshot().total_deliveries() >= BACKLOG as u64
    })
    .await;

    // 两轮心跳之后被移除
    wait_within("客户端被移除", Duration::from_secs(10), || {
        relay.handle.snapshot().client_count() == 0
    })
    .await;

    // 恢复读取：只能读到断开前已写入套接字的部分，随后连接直接结束
    let mut received = 0usize;
    let mut saw_close = false;
    loop {
        match timeout(WAIT, stalled.next()).await.expect("连接没有被强制断开") {
            Some(Ok(Message::Text(_))) => received += 1,
            Some(Ok(Message::Close(_))) => saw_close = true,
            Some(Ok(_)) => {}
            Some(Err(_)) | None => break,
        }
    }
    assert!(received < BACKLOG, "被移除的客户端仍收到了 {} 条积压消息", received);
    assert!(!saw_close);

    assert_eq!(relay.shutdown().await, ShutdownOutcome::Graceful);
    upstream_reader.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_gives_up_after_timeout() {
    init_test_logger();
    let mut upstream = FakeUpstream::start().await;
    let relay = RunningRelay::start(&upstream.url, 60_000, 300).await;
    let _upstream_conn = upstream.next_connection().await;

    let mut stuck = relay.connect("/ws").await;
    next_json(&mut stuck).await;
    wait_until("客户端已注册", || relay.handle.snapshot().client_count() == 1).await;

    // 客户端与上游都不读取，关闭握手永远完成不了
    let started = tokio::time::Instant::now();
    assert_eq!(relay.shutdown().await, ShutdownOutcome::TimedOut);
    assert!(started.elapsed() >= Duration::from_millis(300));
    drop(stuck);
}
