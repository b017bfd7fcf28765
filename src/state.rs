use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use serde::Serialize;
use tracing::{info, warn};
use crate::backend::{Backend, BackendKind, LocalBackend, ObjectStoreBackend};
use crate::cache::{ListingCache, ListingOptions, ThumbnailCache};
use crate::config::{AliasConfig, Config};
use crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::error::{GalleryError, Result};

/// エイリアスの概要（一覧表示用）
#[derive(Debug, Clone, Serialize)]
pub struct AliasInfo {
    pub name: String,
    pub kind: BackendKind,
    pub location: String,
    /// 件数。初回スキャン前・invalidate 直後は None
    pub count: Option<usize>,
}

// アプリケーション状態
//
// エイリアスごとに一覧キャッシュを1つ、サムネイルキャッシュは全エイリアスで共有。
// 操作は commands 以下で impl Gallery として定義している。
pub struct Gallery {
    listings: RwLock<HashMap<String, ListingCache>>,
    pub(crate) thumbnails: ThumbnailCache,
    options: ListingOptions,
    request_timeout: Duration,
}

impl Gallery {
    pub fn new(thumbnails: ThumbnailCache, options: ListingOptions) -> Self {
        Self {
            listings: RwLock::new(HashMap::new()),
            thumbnails,
            options,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// 設定からギャラリーを組み立てる。接続できないエイリアスは警告を出して除外
    pub async fn connect(config: &Config) -> Result<Self> {
        let thumbnails = ThumbnailCache::open(config.thumbnail_dir())?;
        let gallery = Self::new(thumbnails, config.listing_options())
            .with_request_timeout(config.request_timeout());

        for alias in config.valid_aliases() {
            if let Err(e) = gallery.add_alias(alias).await {
                warn!(alias = %alias.name, error = %e, "エイリアスを登録できません");
            }
        }

        Ok(gallery)
    }

    /// バックエンドを作成して登録し、初回スキャンを開始する
    pub async fn add_alias(&self, config: &AliasConfig) -> Result<()> {
        config.validate()?;
        self.ensure_vacant(&config.name)?;

        let backend: Arc<dyn Backend> = match config.kind {
            BackendKind::Local => {
                let path = config.path.as_deref().unwrap_or_default();
                Arc::new(LocalBackend::new(path)?)
            }
            BackendKind::S3 => {
                let settings = config.to_s3_settings(self.request_timeout)?;
                Arc::new(ObjectStoreBackend::connect(&settings).await?)
            }
        };

        self.register(config.name.clone(), backend)
    }

    /// 作成済みのバックエンドを登録する
    pub fn register(&self, name: impl Into<String>, backend: Arc<dyn Backend>) -> Result<()> {
        let name = name.into();
        let location = backend.describe();
        let listing = ListingCache::new(name.clone(), backend, self.options.clone());

        {
            let mut listings = self.listings.write().unwrap_or_else(PoisonError::into_inner);
            if listings.contains_key(&name) {
                return Err(GalleryError::Config(format!("エイリアスが重複しています: {}", name)));
            }
            listings.insert(name.clone(), listing.clone());
        }

        info!(alias = %name, location = %location, "エイリアスを登録");
        listing.start();
        Ok(())
    }

    pub fn remove_alias(&self, name: &str) -> Result<()> {
        let removed = self
            .listings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);

        match removed {
            Some(_) => {
                info!(alias = %name, "エイリアスを削除");
                Ok(())
            }
            None => Err(GalleryError::UnknownAlias(name.to_string())),
        }
    }

    /// 登録済みエイリアス（名前順）
    pub fn aliases(&self) -> Vec<AliasInfo> {
        let listings = self.listings.read().unwrap_or_else(PoisonError::into_inner);
        let mut aliases: Vec<AliasInfo> = listings
            .iter()
            .map(|(name, listing)| AliasInfo {
                name: name.clone(),
                kind: listing.backend().kind(),
                location: listing.backend().describe(),
                count: listing.total_count(),
            })
            .collect();
        aliases.sort_by(|a, b| natord::compare(&a.name, &b.name));
        aliases
    }

    /// エイリアスの一覧キャッシュ（状態は共有）
    pub fn listing(&self, alias: &str) -> Result<ListingCache> {
        self.listings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(alias)
            .cloned()
            .ok_or_else(|| GalleryError::UnknownAlias(alias.to_string()))
    }

    pub fn thumbnail_cache(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// エイリアスとして登録せずに接続だけ確認する
    pub async fn test_connection(&self, config: &AliasConfig) -> Result<()> {
        config.validate()?;
        match config.kind {
            BackendKind::Local => {
                LocalBackend::new(config.path.as_deref().unwrap_or_default())?;
                Ok(())
            }
            BackendKind::S3 => {
                let settings = config.to_s3_settings(self.request_timeout)?;
                ObjectStoreBackend::test_connection(&settings).await
            }
        }
    }

    fn ensure_vacant(&self, name: &str) -> Result<()> {
        let listings = self.listings.read().unwrap_or_else(PoisonError::into_inner);
        if listings.contains_key(name) {
            return Err(GalleryError::Config(format!("エイリアスが重複しています: {}", name)));
        }
        Ok(())
    }
}
