use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::warn;
use super::{sort_newest_first, Backend, BackendKind};
use crate::error::{GalleryError, Result};
use crate::image_utils::is_listable_image;
use crate::thumbnail::ThumbnailSource;
use crate::types::Entry;

/// ローカルディレクトリをルートとするバックエンド
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// ルートが存在するディレクトリでなければエラー
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let metadata = fs::metadata(root).map_err(|e| {
            GalleryError::Config(format!("ディレクトリを開けません: {} - {}", root.display(), e))
        })?;
        if !metadata.is_dir() {
            return Err(GalleryError::Config(format!(
                "ディレクトリではありません: {}",
                root.display()
            )));
        }

        let root = fs::canonicalize(root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ルート外を指すパスは拒否
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty()
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(GalleryError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

// ルート直下の画像を列挙（サブディレクトリには潜らない）
fn scan_dir(root: &Path) -> Result<Vec<Entry>> {
    let entries = fs::read_dir(root)
        .map_err(|e| GalleryError::ScanFailed(format!("{}: {}", root.display(), e)))?;

    let mut files: Vec<Entry> = Vec::new();

    for entry_result in entries {
        // ディレクトリエントリ読み込みエラーはログ出力してスキップ
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "ディレクトリエントリ読み込みエラー");
                continue;
            }
        };

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(name = ?raw, "UTF-8でないファイル名をスキップ");
                continue;
            }
        };

        if !is_listable_image(&name) {
            continue;
        }

        // シンボリックリンクはリンク先で判定
        let metadata = match fs::metadata(entry.path()) {
            Ok(m) => m,
            Err(e) => {
                warn!(name = %name, error = %e, "メタデータ取得エラー");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let modified_at = DateTime::<Utc>::from(metadata.modified().unwrap_or(UNIX_EPOCH));

        files.push(Entry {
            id: name.clone(),
            name: name.clone(),
            path: name,
            size: metadata.len(),
            modified_at,
        });
    }

    sort_newest_first(&mut files);

    Ok(files)
}

// 隠し一時ファイル経由で書き込み（スキャンには '.' 始まりとして映らない）
fn write_file(target: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn scan(&self) -> Result<Vec<Entry>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan_dir(&root))
            .await
            .map_err(|e| GalleryError::ScanFailed(e.to_string()))?
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let full_path = self.resolve(path)?;
        let data = tokio::fs::read(&full_path)
            .await
            .map_err(|e| GalleryError::from_io(e, path))?;
        Ok(Bytes::from(data))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full_path).await?)
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let full_path = self.resolve(path)?;
        tokio::task::spawn_blocking(move || write_file(&full_path, &data)).await??;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.resolve(path)?;
        tokio::fs::remove_file(&full_path)
            .await
            .map_err(|e| GalleryError::from_io(e, path))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let src = self.resolve(from)?;
        let dest = self.resolve(to)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&src, &dest)
            .await
            .map_err(|e| GalleryError::from_io(e, from))
    }

    fn thumbnail_identifier(&self, path: &str) -> Result<String> {
        Ok(self.resolve(path)?.to_string_lossy().into_owned())
    }

    async fn thumbnail_source(&self, path: &str) -> Result<ThumbnailSource> {
        let full_path = self.resolve(path)?;
        if !tokio::fs::try_exists(&full_path).await? {
            return Err(GalleryError::NotFound(path.to_string()));
        }
        Ok(ThumbnailSource::File(full_path))
    }
}
