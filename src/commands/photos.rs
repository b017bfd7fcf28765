use bytes::Bytes;
use crate::error::Result;
use crate::image_utils::content_type_for;
use crate::state::Gallery;
use crate::types::Page;

/// 元画像の中身
#[derive(Debug, Clone)]
pub struct Original {
    pub body: Bytes,
    pub content_type: &'static str,
}

impl Gallery {
    /// 一覧の1ページ。キャッシュから即座に返す（未準備なら空ページ）
    pub fn list(&self, alias: &str, cursor: &str, limit: usize) -> Result<Page> {
        Ok(self.listing(alias)?.get_page(cursor, limit))
    }

    pub async fn original(&self, alias: &str, path: &str) -> Result<Original> {
        let listing = self.listing(alias)?;
        let body = listing.backend().read(path).await?;
        Ok(Original {
            body,
            content_type: content_type_for(path),
        })
    }

    /// 元画像へ直接リダイレクトできるURL（オブジェクトストレージの署名付きURL）。
    /// None なら original() でバイト列を配信する
    pub async fn original_url(&self, alias: &str, path: &str) -> Result<Option<String>> {
        self.listing(alias)?.backend().original_url(path).await
    }
}
