//! ストレージバックエンド
//!
//! ローカルディレクトリとオブジェクトストレージを同じ能力セットで扱う。
//! 一覧キャッシュはこのトレイトに対して一度だけ書かれている。

mod local;
mod object;

pub use local::LocalBackend;
pub use object::{ObjectStoreBackend, S3Settings};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::thumbnail::ThumbnailSource;
use crate::types::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    S3,
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// ログ用の表示名（ルートパスやバケット/プレフィックス）
    fn describe(&self) -> String;

    /// 直下の画像を列挙し、更新日時の降順で返す。
    /// 失敗は ScanFailed
    async fn scan(&self) -> Result<Vec<Entry>>;

    async fn read(&self, path: &str) -> Result<Bytes>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// 書き込み（既存なら上書き。名前の衝突解決は呼び出し側）
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;

    /// 同一バックエンド内の移動
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// サムネイルキャッシュのキーにする識別子。
    /// ルート外を指すパスは InvalidPath（キャッシュ参照より前に検証する）
    fn thumbnail_identifier(&self, path: &str) -> Result<String>;

    async fn thumbnail_source(&self, path: &str) -> Result<ThumbnailSource>;

    /// 元画像を直接取得できるURL（署名付きなど）。無ければ None でバイト列を配信する
    async fn original_url(&self, _path: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

// 更新日時の降順。同時刻は名前の自然順で固定する
pub(crate) fn sort_newest_first(entries: &mut [Entry]) {
    entries.sort_by(|a, b| {
        b.modified_at
            .cmp(&a.modified_at)
            .then_with(|| natord::compare(&a.name, &b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(name: &str, secs: i64) -> Entry {
        Entry {
            id: name.to_string(),
            name: name.to_string(),
            path: name.to_string(),
            size: 0,
            modified_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn newest_first_with_natural_tiebreak() {
        let mut entries = vec![
            entry("img10.jpg", 5),
            entry("old.jpg", 1),
            entry("img2.jpg", 5),
            entry("new.jpg", 9),
        ];
        sort_newest_first(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["new.jpg", "img2.jpg", "img10.jpg", "old.jpg"]);
    }
}
