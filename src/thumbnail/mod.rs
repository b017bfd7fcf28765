mod image;

pub use self::image::{decode_file, decode_oriented};

use std::path::PathBuf;
use bytes::Bytes;
use serde::Serialize;
use crate::error::{GalleryError, Result};
use crate::image_utils::create_thumbnail;

/// サムネイルの元データ
#[derive(Debug, Clone)]
pub enum ThumbnailSource {
    /// ローカルファイル（パスから読む）
    File(PathBuf),
    /// 取得済みのバイト列（オブジェクトストレージ）
    Bytes(Bytes),
}

/// デコード→向き補正→リサイズ→エンコードのパイプライン
pub trait ThumbnailRenderer: Send + Sync {
    fn render(&self, identifier: &str, source: &ThumbnailSource) -> Result<Vec<u8>>;
}

/// 標準のJPEGサムネイル生成
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegThumbnailRenderer;

impl ThumbnailRenderer for JpegThumbnailRenderer {
    fn render(&self, identifier: &str, source: &ThumbnailSource) -> Result<Vec<u8>> {
        let img = match source {
            ThumbnailSource::File(path) => decode_file(path),
            ThumbnailSource::Bytes(data) => decode_oriented(data),
        }
        .map_err(|reason| GalleryError::ThumbnailSourceUnreadable {
            identifier: identifier.to_string(),
            reason,
        })?;

        create_thumbnail(&img).map_err(|reason| GalleryError::ThumbnailEncodeFailed {
            identifier: identifier.to_string(),
            reason,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailStatus {
    Cached,
    Generated,
}

/// サムネイル取得結果
#[derive(Debug, Clone, Serialize)]
pub struct ThumbnailResult {
    /// キャッシュキー（MD5ハッシュ）
    pub cache_key: String,
    /// キャッシュファイルの絶対パス
    pub cache_path: PathBuf,
    pub status: ThumbnailStatus,
}
