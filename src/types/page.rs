use serde::{Deserialize, Serialize};
use super::Entry;

// 一覧の1ページ分。next_cursor が空なら末尾
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub entries: Vec<Entry>,
    pub next_cursor: String,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_empty()
    }
}
