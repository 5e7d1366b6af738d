// common_models/src/news.rs

//! 上游快讯的强类型模型。
//!
//! 中继本身不解析快讯内容，只做类型过滤；这里的类型供订阅客户端使用，
//! 用于把 `flash` 与 `flash_impact` 合并为可展示的条目。上游字段较多且并不总是齐全，
//! 因此绝大部分字段都带有 `#[serde(default)]`。

use crate::enums::ImpactDirection;
use serde::{Deserialize, Deserializer, Serialize};

/// 缺失与显式的 `null` 都取默认值。上游对空列表的写法并不统一。
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 上游推送的快讯消息，按 `type` 字段区分。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum NewsMessage {
    #[serde(rename = "flash")]
    Flash { data: FlashData },
    #[serde(rename = "flash_impact")]
    FlashImpact { data: FlashImpactData },
}

impl NewsMessage {
    /// 消息所指向的快讯 ID。
    pub fn news_id(&self) -> &str {
        match self {
            NewsMessage::Flash { data } => &data.id,
            NewsMessage::FlashImpact { data } => &data.id,
        }
    }
}

/// 快讯正文。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FlashContent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pic: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
}

/// 快讯附带的备注（通常是配图与补充说明）。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FlashRemark {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pics: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub remark_type: String,
    #[serde(default)]
    pub vip_level: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FlashData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub a_shares: Vec<String>,
    #[serde(default)]
    pub action: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: Vec<i64>,
    #[serde(default)]
    pub data: FlashContent,
    pub id: String,
    /// 重要程度，`1` 表示重要快讯。
    #[serde(default)]
    pub important: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remark: Vec<FlashRemark>,
    #[serde(default)]
    pub time: String,
    #[serde(default, rename = "type")]
    pub flash_type: i64,
    #[serde(default)]
    pub mid: String,
}

/// 单个标的上的影响判断。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlashImpact {
    #[serde(default, deserialize_with = "null_as_default")]
    pub symbol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub impact: ImpactDirection,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlashImpactData {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub impact: Vec<FlashImpact>,
}

/// 客户端展示用的合并条目：一条快讯加上（可能稍后到达的）影响数据。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MergedNewsItem {
    pub id: String,
    pub content: String,
    pub time: String,
    pub important: bool,
    pub pics: Vec<String>,
    pub impacts: Vec<FlashImpact>,
    /// 客户端收到该快讯的本地时间（Unix 毫秒）。
    pub received_at: i64,
}

impl MergedNewsItem {
    /// 由快讯数据构造展示条目，所有备注中的图片被展平为一个列表，影响数据初始为空。
    pub fn from_flash(data: &FlashData, received_at: i64) -> Self {
        Self {
            id: data.id.clone(),
            content: data.data.content.clone(),
            time: data.time.clone(),
            important: data.important == 1,
            pics: data
                .remark
                .iter()
                .flat_map(|remark| remark.pics.iter().cloned())
                .collect(),
            impacts: Vec::new(),
            received_at,
        }
    }
}
