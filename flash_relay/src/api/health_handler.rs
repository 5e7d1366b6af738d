// flash_relay/src/api/health_handler.rs

//! `GET /health` 处理器。

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use common_models::HealthReport;

/// 返回中继当前的健康状态：上游是否已连接，以及已注册的客户端数量。
///
/// 数据来自协调器发布的快照，不会阻塞事件循环。
pub async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    let snapshot = state.relay.snapshot();
    Json(HealthReport::ok(snapshot.upstream_connected(), snapshot.client_count()))
}
