//! `common_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了快讯中继 (`flash_relay`) 与快讯订阅客户端 (`flash_feed_client`)
//! 之间共享的数据结构和枚举类型。
//!
//! 主要包含以下类型的模型：
//! - **WebSocket 消息负载 (`ws_payloads`)**: 中继主动推送给浏览器客户端的控制类消息
//!   （连接确认、上游状态通知）以及健康检查报告。
//! - **快讯模型 (`news`)**: 上游快讯 (`flash`) 与快讯影响 (`flash_impact`) 的强类型表示，
//!   以及客户端合并后的展示条目。
//! - **通用枚举 (`enums`)**: 连接状态、影响方向等。
//!
//! 所有模型都派生 `serde::Serialize` / `serde::Deserialize`、`Debug` 与 `Clone`，
//! 字段名在 JSON 中使用与前端一致的 camelCase / snake_case 写法（见各结构体上的 serde 属性）。

pub mod enums;
pub mod news;
pub mod ws_payloads;

pub use enums::{ConnectionStatus, ImpactDirection};
pub use news::{FlashData, FlashImpact, FlashImpactData, MergedNewsItem, NewsMessage};
pub use ws_payloads::{
    ConnectionAckPayload, HealthReport, UpstreamStatusPayload, FLASH_IMPACT_MESSAGE_TYPE,
    FLASH_MESSAGE_TYPE,
};
