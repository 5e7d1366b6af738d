// flash_relay/src/state.rs

//! HTTP 路由共享的应用状态。

use crate::coordinator::RelayHandle;

/// axum 路由的共享状态。克隆开销很小，每个请求都会拿到一份。
#[derive(Debug, Clone)]
pub struct AppState {
    pub relay: RelayHandle,
}

impl AppState {
    pub fn new(relay: RelayHandle) -> Self {
        Self { relay }
    }
}
