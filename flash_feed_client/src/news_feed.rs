// flash_feed_client/src/news_feed.rs

//! 快讯列表：最新的在前，容量有限。
//!
//! `flash` 按 id 合并：新 id 插到最前；已存在的 id 用新内容替换并移到最前，
//! 已合并的影响信息保留。`flash_impact` 只更新已存在条目的 `impacts`。

use common_models::{FlashData, FlashImpactData, MergedNewsItem, NewsMessage};
use log::debug;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct NewsFeed {
    items: VecDeque<MergedNewsItem>,
    max_messages: usize,
}

impl NewsFeed {
    pub fn new(max_messages: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(max_messages),
            max_messages,
        }
    }

    /// 应用一条快讯消息。
    ///
    /// # Arguments
    /// * `message` - 已解析的 `flash` 或 `flash_impact`。
    /// * `received_at` - 收到消息时的 Unix 毫秒时间戳。
    ///
    /// # Returns
    /// * `bool` - 列表是否发生了变化。指向未知 id 的 `flash_impact` 不会改变列表。
    pub fn apply(&mut self, message: NewsMessage, received_at: i64) -> bool {
        match message {
            NewsMessage::Flash { data } => {
                self.apply_flash(&data, received_at);
                true
            }
            NewsMessage::FlashImpact { data } => self.apply_impact(data),
        }
    }

    fn apply_flash(&mut self, data: &FlashData, received_at: i64) {
        let mut item = MergedNewsItem::from_flash(data, received_at);
        if let Some(position) = self.position(&data.id) {
            if let Some(previous) = self.items.remove(position) {
                item.impacts = previous.impacts;
            }
        }
        self.items.push_front(item);
        self.items.truncate(self.max_messages);
    }

    fn apply_impact(&mut self, data: FlashImpactData) -> bool {
        match self.items.iter_mut().find(|item| item.id == data.id) {
            Some(item) => {
                item.impacts = data.impact;
                true
            }
            None => {
                debug!("[快讯列表] 忽略未知快讯 {} 的影响信息", data.id);
                false
            }
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&MergedNewsItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// 当前列表的副本，最新的在前。
    pub fn snapshot(&self) -> Vec<MergedNewsItem> {
        self.items.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
