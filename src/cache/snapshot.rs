//! 一覧スナップショット
//!
//! 公開後は一切変更しない。新しいスキャン結果は新しいスナップショットとして
//! 丸ごと差し替えるので、古い参照を持つ読み手は常に一貫した内容を見る。

use std::time::{Duration, Instant};
use crate::types::{Entry, Page};

#[derive(Debug, Clone, Default)]
pub struct ListingSnapshot {
    entries: Vec<Entry>,
    /// スキャン完了時刻。None は未準備（初回スキャン前・invalidate 直後）
    captured_at: Option<Instant>,
}

impl ListingSnapshot {
    /// 未準備の空スナップショット
    pub fn empty() -> Self {
        Self::default()
    }

    /// スキャン結果から作成（entries は更新日時の降順で渡すこと）
    pub fn new(entries: Vec<Entry>, captured_at: Instant) -> Self {
        Self {
            entries,
            captured_at: Some(captured_at),
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn captured_at(&self) -> Option<Instant> {
        self.captured_at
    }

    pub fn is_ready(&self) -> bool {
        self.captured_at.is_some()
    }

    /// 鮮度切れか。未準備のスナップショットは常に鮮度切れ扱い
    pub fn is_stale(&self, now: Instant, window: Duration) -> bool {
        match self.captured_at {
            Some(captured_at) => now.saturating_duration_since(captured_at) > window,
            None => true,
        }
    }

    /// cursor の次の要素から最大 limit 件を返す。
    /// cursor が空、または見つからない場合は先頭から。
    pub fn page(&self, cursor: &str, limit: usize) -> Page {
        if !self.is_ready() {
            return Page::default();
        }

        let start = if cursor.is_empty() {
            0
        } else {
            self.entries
                .iter()
                .position(|e| e.id == cursor)
                .map(|i| i + 1)
                .unwrap_or(0)
        };

        let end = start.saturating_add(limit).min(self.entries.len());
        let entries = self.entries[start..end].to_vec();

        // 残りがある場合のみ、ページ末尾のIDを次のカーソルにする
        let next_cursor = if end < self.entries.len() {
            entries.last().map(|e| e.id.clone()).unwrap_or_default()
        } else {
            String::new()
        };

        Page { entries, next_cursor }
    }
}
