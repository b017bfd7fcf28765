use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 一覧に並ぶ画像1件（スキャンごとに作り直す不変値）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// バックエンド内で一意（ローカル: ファイル名 / オブジェクトストレージ: キー全体）
    pub id: String,
    pub name: String,
    /// ルート（プレフィックス）からの相対パス。ファイル操作に使う
    pub path: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}
