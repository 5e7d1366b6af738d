// flash_relay/src/api/mod.rs

//! HTTP 路由。
//!
//! - `GET /health`: 健康检查。
//! - `GET /`、`GET /ws`: WebSocket 升级。
//! - 任意路径的 `OPTIONS`: 预检，返回 204。
//! - 其他请求: 404 `{"error":"Not found"}`。
//!
//! 所有响应都带有允许任意来源的 CORS 头。

pub mod health_handler;

use crate::state::AppState;
use crate::ws_server::client_connection::ws_upgrade_handler;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;

/// 构建中继的完整路由。
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler::health_check).options(preflight))
        .route("/", get(ws_upgrade_handler).options(preflight))
        .route("/ws", get(ws_upgrade_handler).options(preflight))
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(state)
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found(method: Method) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}
