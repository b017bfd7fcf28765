use std::time::Duration;
use tracing::info;
use crate::cache::RefreshOutcome;
use crate::error::Result;
use crate::state::Gallery;

impl Gallery {
    /// 一覧キャッシュを破棄して再スキャンを起動する
    pub fn invalidate(&self, alias: &str) -> Result<()> {
        self.listing(alias)?.invalidate();
        Ok(())
    }

    /// その場で再スキャンして完了を待つ
    pub async fn refresh(&self, alias: &str) -> Result<RefreshOutcome> {
        Ok(self.listing(alias)?.refresh().await)
    }

    /// 一覧が準備完了になるまで待つ。期限切れなら false
    pub async fn wait_ready(&self, alias: &str, timeout: Duration) -> Result<bool> {
        let listing = self.listing(alias)?;
        Ok(tokio::time::timeout(timeout, listing.ready()).await.is_ok())
    }

    /// サムネイルキャッシュを全削除し、削除件数を返す
    pub async fn clear_thumbnail_cache(&self) -> Result<usize> {
        let removed = self.thumbnails.clear_all().await?;
        info!(removed, "サムネイルキャッシュを削除");
        Ok(removed)
    }
}
