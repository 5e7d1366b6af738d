// flash_relay/src/upstream/mod.rs

//! 上游快讯源连接：状态机、连接任务与消息过滤。

pub mod connection;
pub mod connector;
pub mod message_filter;
