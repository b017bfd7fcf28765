//! ギャラリー全体で使うエラー型

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    /// バックエンドの列挙失敗。直前のスナップショットは保持される
    #[error("スキャン失敗: {0}")]
    ScanFailed(String),

    /// サムネイル元ファイル/オブジェクトが読めない（存在しない・壊れている）
    #[error("サムネイル元を読み込めません ({identifier}): {reason}")]
    ThumbnailSourceUnreadable { identifier: String, reason: String },

    /// リサイズ・エンコード・書き出しの失敗
    #[error("サムネイル生成エラー ({identifier}): {reason}")]
    ThumbnailEncodeFailed { identifier: String, reason: String },

    #[error("エイリアスが見つかりません: {0}")]
    UnknownAlias(String),

    #[error("ファイルが見つかりません: {0}")]
    NotFound(String),

    #[error("無効なパス: {0}")]
    InvalidPath(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("IOエラー: {0}")]
    Io(#[from] io::Error),

    #[error("オブジェクトストレージエラー: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("バックグラウンドタスクエラー: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl GalleryError {
    /// io::Error を NotFound とそれ以外に振り分ける
    pub(crate) fn from_io(err: io::Error, path: &str) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            GalleryError::NotFound(path.to_string())
        } else {
            GalleryError::Io(err)
        }
    }

    /// object_store::Error を NotFound とそれ以外に振り分ける
    pub(crate) fn from_object_store(err: object_store::Error, key: &str) -> Self {
        match err {
            object_store::Error::NotFound { .. } => GalleryError::NotFound(key.to_string()),
            other => GalleryError::ObjectStore(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, GalleryError>;
