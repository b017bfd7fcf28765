//! 設定ファイル（YAML）

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::backend::{BackendKind, S3Settings};
use crate::cache::{ListingOptions, ThumbnailCache};
use crate::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, FRESHNESS_WINDOW};
use crate::error::{GalleryError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aliases: Vec<AliasConfig>,
    pub cache: CacheConfig,
}

/// エイリアス1件分。s3 の場合 path はバケット内のプレフィックス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BackendKind,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub thumbnail_dir: Option<PathBuf>,
    pub freshness_secs: u64,
    pub scan_timeout_secs: Option<u64>,
    pub request_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            thumbnail_dir: None,
            freshness_secs: FRESHNESS_WINDOW.as_secs(),
            scan_timeout_secs: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// 設定ファイルを読み込む。ファイルが無ければ既定値（エイリアス無し）
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "設定ファイルが無いため既定値を使用");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            GalleryError::Config(format!("設定ファイル読み込みエラー: {} - {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| GalleryError::Config(format!("設定ファイルの解析エラー: {}", e)))
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.cache
            .thumbnail_dir
            .clone()
            .unwrap_or_else(ThumbnailCache::default_dir)
    }

    pub fn listing_options(&self) -> ListingOptions {
        ListingOptions::default()
            .with_freshness_window(Duration::from_secs(self.cache.freshness_secs))
            .with_scan_timeout(self.cache.scan_timeout_secs.map(Duration::from_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.cache.request_timeout_secs)
    }

    /// 検証を通ったエイリアスだけを返す。不正なものは警告を出して除外
    pub fn valid_aliases(&self) -> Vec<&AliasConfig> {
        let mut seen = HashSet::new();
        let mut valid = Vec::new();

        for alias in &self.aliases {
            if let Err(e) = alias.validate() {
                warn!(alias = %alias.name, error = %e, "不正なエイリアス設定をスキップ");
                continue;
            }
            if !seen.insert(alias.name.as_str()) {
                warn!(alias = %alias.name, "重複したエイリアス名をスキップ");
                continue;
            }
            valid.push(alias);
        }

        valid
    }
}

// 空文字も未指定扱い
fn required<'a>(value: &'a Option<String>, field: &str, alias: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| GalleryError::Config(format!("{}: {} が必要です", alias, field)))
}

impl AliasConfig {
    pub fn local(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: BackendKind::Local,
            path: Some(path.into()),
            bucket: None,
            endpoint: None,
            region: None,
            access_key: None,
            secret_key: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GalleryError::Config("エイリアス名が空です".to_string()));
        }

        match self.kind {
            BackendKind::Local => {
                required(&self.path, "path", &self.name)?;
            }
            BackendKind::S3 => {
                required(&self.bucket, "bucket", &self.name)?;
                required(&self.endpoint, "endpoint", &self.name)?;
                required(&self.access_key, "access_key", &self.name)?;
                required(&self.secret_key, "secret_key", &self.name)?;
            }
        }
        Ok(())
    }

    pub fn to_s3_settings(&self, request_timeout: Duration) -> Result<S3Settings> {
        Ok(S3Settings {
            endpoint: required(&self.endpoint, "endpoint", &self.name)?.to_string(),
            bucket: required(&self.bucket, "bucket", &self.name)?.to_string(),
            prefix: self.path.clone().unwrap_or_default(),
            region: self.region.clone(),
            access_key: required(&self.access_key, "access_key", &self.name)?.to_string(),
            secret_key: required(&self.secret_key, "secret_key", &self.name)?.to_string(),
            request_timeout,
        })
    }
}
