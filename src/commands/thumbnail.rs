use bytes::Bytes;
use crate::constants::{THUMBNAIL_CACHE_CONTROL, THUMBNAIL_CONTENT_TYPE};
use crate::error::{GalleryError, Result};
use crate::state::Gallery;
use crate::thumbnail::ThumbnailStatus;

/// サムネイル配信用のレスポンス
#[derive(Debug, Clone)]
pub struct ThumbnailResponse {
    pub body: Bytes,
    pub content_type: &'static str,
    pub cache_control: &'static str,
    pub cache_key: String,
    pub status: ThumbnailStatus,
}

impl Gallery {
    /// サムネイルを返す。キャッシュに無ければ生成する
    pub async fn thumbnail(&self, alias: &str, path: &str) -> Result<ThumbnailResponse> {
        let listing = self.listing(alias)?;
        let backend = listing.backend();
        let identifier = backend.thumbnail_identifier(path)?;

        // ヒット時は元画像を取りに行かない
        let result = match self.thumbnails.lookup(&identifier).await {
            Some(hit) => hit,
            None => {
                let source = backend.thumbnail_source(path).await.map_err(|e| match e {
                    GalleryError::NotFound(missing) => GalleryError::ThumbnailSourceUnreadable {
                        identifier: identifier.clone(),
                        reason: format!("ファイルが見つかりません: {}", missing),
                    },
                    other => other,
                })?;
                self.thumbnails.get_or_create(&identifier, source).await?
            }
        };

        let body = tokio::fs::read(&result.cache_path).await?;

        Ok(ThumbnailResponse {
            body: Bytes::from(body),
            content_type: THUMBNAIL_CONTENT_TYPE,
            cache_control: THUMBNAIL_CACHE_CONTROL,
            cache_key: result.cache_key,
            status: result.status,
        })
    }
}
