use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use crate::error::{GalleryError, Result};
use crate::thumbnail::{
    JpegThumbnailRenderer, ThumbnailRenderer, ThumbnailResult, ThumbnailSource, ThumbnailStatus,
};

// サムネイルキャッシュディレクトリ
//
// キーは元の識別子（ローカルはパス、オブジェクトストレージはバケット/キー）のみ。
// 元画像の中身が変わっても識別子が同じなら clear_all までは古いサムネイルを返す。
pub struct ThumbnailCache {
    pub cache_dir: PathBuf,
    renderer: Arc<dyn ThumbnailRenderer>,
}

impl ThumbnailCache {
    /// 既定のキャッシュディレクトリ（OSのキャッシュ領域配下）
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .map(|p| p.join("photo-gallery").join("thumbnails"))
            .unwrap_or_else(|| PathBuf::from("./cache/thumbnails"))
    }

    /// キャッシュディレクトリを作成して開く
    pub fn open(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            cache_dir,
            renderer: Arc::new(JpegThumbnailRenderer),
        })
    }

    /// 生成パイプラインを差し替える
    pub fn with_renderer(mut self, renderer: Arc<dyn ThumbnailRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    // キャッシュキーを生成（識別子のMD5）
    pub fn cache_key(identifier: &str) -> String {
        format!("{:x}", md5::compute(identifier.as_bytes()))
    }

    pub fn cache_path(&self, identifier: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.jpg", Self::cache_key(identifier)))
    }

    /// ディスクキャッシュのみを確認（生成はしない）
    pub async fn lookup(&self, identifier: &str) -> Option<ThumbnailResult> {
        let cache_path = self.cache_path(identifier);
        let is_file = matches!(tokio::fs::metadata(&cache_path).await, Ok(m) if m.is_file());
        if is_file {
            debug!(identifier, "サムネイルキャッシュヒット");
            Some(ThumbnailResult {
                cache_key: Self::cache_key(identifier),
                cache_path,
                status: ThumbnailStatus::Cached,
            })
        } else {
            None
        }
    }

    /// キャッシュにあれば返し、なければ生成して保存する
    pub async fn get_or_create(
        &self,
        identifier: &str,
        source: ThumbnailSource,
    ) -> Result<ThumbnailResult> {
        if let Some(hit) = self.lookup(identifier).await {
            return Ok(hit);
        }

        let cache_key = Self::cache_key(identifier);
        let cache_path = self.cache_path(identifier);
        let cache_dir = self.cache_dir.clone();
        let renderer = Arc::clone(&self.renderer);
        let identifier = identifier.to_string();

        // デコード・リサイズ・書き込みはブロッキングスレッドで
        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let data = renderer.render(&identifier, &source)?;

            write_atomic(&cache_dir, &cache_path, &data).map_err(|e| {
                GalleryError::ThumbnailEncodeFailed {
                    identifier: identifier.clone(),
                    reason: format!("キャッシュ書き込みエラー: {}", e),
                }
            })?;

            debug!(
                identifier = %identifier,
                bytes = data.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "サムネイル生成"
            );

            Ok(ThumbnailResult {
                cache_key,
                cache_path,
                status: ThumbnailStatus::Generated,
            })
        })
        .await?
    }

    /// キャッシュディレクトリ内の全サムネイルを削除し、削除件数を返す。
    /// 生成中の一時ファイルには触れない（直後に書き戻されることはある）
    pub async fn clear_all(&self) -> Result<usize> {
        let cache_dir = self.cache_dir.clone();

        tokio::task::spawn_blocking(move || {
            let entries = match fs::read_dir(&cache_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
                Err(e) => return Err(GalleryError::Io(e)),
            };

            let mut removed = 0;
            for entry_result in entries {
                let entry = match entry_result {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(error = %e, "キャッシュエントリ読み込みエラー");
                        continue;
                    }
                };
                let is_thumbnail = entry.file_name().to_str().is_some_and(is_cache_file_name);
                if !is_thumbnail {
                    continue;
                }
                let path = entry.path();
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "キャッシュ削除失敗"),
                }
            }
            Ok(removed)
        })
        .await?
    }
}

// `<md5>.jpg` 形式のみがキャッシュ本体。'.tmp' 始まりは生成中
fn is_cache_file_name(name: &str) -> bool {
    name.strip_suffix(".jpg")
        .is_some_and(|key| key.len() == 32 && key.chars().all(|c| c.is_ascii_hexdigit()))
}

// 一時ファイルに書いてからリネーム（途中までのファイルを残さない）
fn write_atomic(dir: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;

    match tmp.persist(target) {
        Ok(_) => Ok(()),
        // 同じキーを同時に生成した別リクエストが先に書いた場合は中身も同じ
        Err(_) if target.is_file() => Ok(()),
        Err(e) => Err(e.error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl ThumbnailRenderer for CountingRenderer {
        fn render(&self, _identifier: &str, _source: &ThumbnailSource) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(b"jpeg".to_vec())
        }
    }

    struct FailingRenderer;

    impl ThumbnailRenderer for FailingRenderer {
        fn render(&self, identifier: &str, _source: &ThumbnailSource) -> Result<Vec<u8>> {
            Err(GalleryError::ThumbnailEncodeFailed {
                identifier: identifier.to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    fn source() -> ThumbnailSource {
        ThumbnailSource::Bytes(Bytes::from_static(b"ignored"))
    }

    #[test]
    fn cache_key_is_md5_hex() {
        let key = ThumbnailCache::cache_key("photos/a.jpg");
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, ThumbnailCache::cache_key("photos/a.jpg"));
        assert_ne!(key, ThumbnailCache::cache_key("photos/b.jpg"));
    }

    #[tokio::test]
    async fn second_request_is_served_from_disk() {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(CountingRenderer { calls: AtomicUsize::new(0) });
        let cache = ThumbnailCache::open(dir.path()).unwrap().with_renderer(renderer.clone());

        let first = cache.get_or_create("a.jpg", source()).await.unwrap();
        let second = cache.get_or_create("a.jpg", source()).await.unwrap();

        assert_eq!(first.status, ThumbnailStatus::Generated);
        assert_eq!(second.status, ThumbnailStatus::Cached);
        assert_eq!(first.cache_path, second.cache_path);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fs::read(&second.cache_path).unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn failed_generation_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::open(dir.path())
            .unwrap()
            .with_renderer(Arc::new(FailingRenderer));

        let err = cache.get_or_create("a.jpg", source()).await.unwrap_err();
        assert!(matches!(err, GalleryError::ThumbnailEncodeFailed { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn clear_all_forces_regeneration() {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(CountingRenderer { calls: AtomicUsize::new(0) });
        let cache = ThumbnailCache::open(dir.path()).unwrap().with_renderer(renderer.clone());

        cache.get_or_create("a.jpg", source()).await.unwrap();
        cache.get_or_create("b.jpg", source()).await.unwrap();
        assert_eq!(cache.clear_all().await.unwrap(), 2);
        assert!(cache.lookup("a.jpg").await.is_none());

        let again = cache.get_or_create("a.jpg", source()).await.unwrap();
        assert_eq!(again.status, ThumbnailStatus::Generated);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn clear_all_leaves_in_progress_temp_files() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::open(dir.path())
            .unwrap()
            .with_renderer(Arc::new(CountingRenderer { calls: AtomicUsize::new(0) }));

        cache.get_or_create("a.jpg", source()).await.unwrap();
        let pending = NamedTempFile::new_in(dir.path()).unwrap();
        assert!(pending.path().file_name().unwrap().to_str().unwrap().starts_with(".tmp"));

        assert_eq!(cache.clear_all().await.unwrap(), 1);
        assert!(pending.path().is_file());

        // 一時ファイルが残っていれば書き込みはそのまま完了できる
        let target = cache.cache_path("b.jpg");
        pending.persist(&target).unwrap();
        assert_eq!(cache.lookup("b.jpg").await.unwrap().status, ThumbnailStatus::Cached);
    }

    #[test]
    fn only_md5_jpg_names_are_cache_files() {
        assert!(is_cache_file_name(&format!("{}.jpg", ThumbnailCache::cache_key("x"))));
        assert!(!is_cache_file_name(".tmpAbC123"));
        assert!(!is_cache_file_name("notes.jpg"));
        assert!(!is_cache_file_name(&ThumbnailCache::cache_key("x")));
    }

    #[tokio::test]
    async fn clear_all_on_missing_dir_is_noop() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::open(dir.path().join("thumbs")).unwrap();
        fs::remove_dir(&cache.cache_dir).unwrap();
        assert_eq!(cache.clear_all().await.unwrap(), 0);
    }
}
