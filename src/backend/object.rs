use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::AmazonS3Builder;
use object_store::path::{self, Path as ObjectPath};
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ClientOptions, ObjectStore, PutOptions, PutPayload};
use tracing::info;
use super::{sort_newest_first, Backend, BackendKind};
use crate::constants::{
    OBJECT_STORE_CONNECT_TIMEOUT, OBJECT_STORE_PROBE_TIMEOUT, ORIGINAL_URL_EXPIRY,
};
use crate::error::{GalleryError, Result};
use crate::image_utils::{content_type_for, is_listable_image};
use crate::thumbnail::ThumbnailSource;
use crate::types::Entry;

/// S3互換ストレージへの接続設定
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// `https://` で始まればTLS、スキーム無しは平文HTTP
    pub endpoint: String,
    pub bucket: String,
    /// バケット内のプレフィックス（空ならバケット直下）
    pub prefix: String,
    pub region: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub request_timeout: Duration,
}

/// オブジェクトストレージ上のバケット/プレフィックスをルートとするバックエンド
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    /// 元画像の署名付きURL発行用。無ければバイト列で配信
    signer: Option<Arc<dyn Signer>>,
    bucket: String,
    /// 前後の '/' を除いたプレフィックス
    prefix: String,
}

// エンドポイントにスキームを補い、平文HTTPを許可するか返す
fn normalize_endpoint(endpoint: &str) -> (String, bool) {
    if endpoint.starts_with("https://") {
        (endpoint.to_string(), false)
    } else if endpoint.starts_with("http://") {
        (endpoint.to_string(), true)
    } else {
        (format!("http://{}", endpoint), true)
    }
}

impl ObjectStoreBackend {
    /// 任意の ObjectStore から作成（接続確認はしない）
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, prefix: &str) -> Self {
        Self {
            store,
            signer: None,
            bucket: bucket.into(),
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// S3クライアントを作成し、バケット/プレフィックスに到達できるか確認する
    pub async fn connect(settings: &S3Settings) -> Result<Self> {
        let (endpoint, allow_http) = normalize_endpoint(&settings.endpoint);

        let client_options = ClientOptions::new()
            .with_connect_timeout(OBJECT_STORE_CONNECT_TIMEOUT)
            .with_timeout(settings.request_timeout);

        let mut builder = AmazonS3Builder::new()
            .with_endpoint(endpoint)
            .with_allow_http(allow_http)
            .with_bucket_name(&settings.bucket)
            .with_access_key_id(&settings.access_key)
            .with_secret_access_key(&settings.secret_key)
            .with_client_options(client_options);
        if let Some(region) = settings.region.as_deref().filter(|r| !r.is_empty()) {
            builder = builder.with_region(region);
        }

        let store = builder
            .build()
            .map_err(|e| GalleryError::Config(format!("S3クライアント作成エラー: {}", e)))?;

        let store = Arc::new(store);
        let backend = Self::new(store.clone(), settings.bucket.clone(), &settings.prefix)
            .with_signer(store);
        backend.probe().await?;

        info!(endpoint = %settings.endpoint, bucket = %settings.bucket, "S3接続確認OK");
        Ok(backend)
    }

    /// エイリアスとして登録せずに接続だけ確認する
    pub async fn test_connection(settings: &S3Settings) -> Result<()> {
        Self::connect(settings).await.map(|_| ())
    }

    // プレフィックスを1回列挙して到達確認
    async fn probe(&self) -> Result<()> {
        let prefix = self.prefix_path().map_err(|e| {
            GalleryError::Config(format!("無効なプレフィックス {}: {}", self.prefix, e))
        })?;
        match tokio::time::timeout(
            OBJECT_STORE_PROBE_TIMEOUT,
            self.store.list_with_delimiter(prefix.as_ref()),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(GalleryError::Config(format!(
                "バケットにアクセスできません ({}): {}",
                self.bucket, e
            ))),
            Err(_) => Err(GalleryError::Config(format!(
                "バケットへの接続がタイムアウトしました: {}",
                self.bucket
            ))),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn prefix_path(&self) -> std::result::Result<Option<ObjectPath>, path::Error> {
        if self.prefix.is_empty() {
            return Ok(None);
        }
        ObjectPath::parse(&self.prefix).map(Some)
    }

    // プレフィックス付きのキー文字列
    fn full_key(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }

    fn location(&self, path: &str) -> Result<ObjectPath> {
        let is_plain = !path.is_empty()
            && !path.starts_with('/')
            && path.split('/').all(|s| !s.is_empty() && s != "." && s != "..");
        if !is_plain {
            return Err(GalleryError::InvalidPath(path.to_string()));
        }
        ObjectPath::parse(self.full_key(path))
            .map_err(|e| GalleryError::InvalidPath(format!("{}: {}", path, e)))
    }

    // キーからプレフィックスを外した相対パス。プレフィックス自身なら None
    fn relative_path<'a>(&self, key: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(key);
        }
        key.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }
}

#[async_trait]
impl Backend for ObjectStoreBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    fn describe(&self) -> String {
        if self.prefix.is_empty() {
            self.bucket.clone()
        } else {
            format!("{}/{}", self.bucket, self.prefix)
        }
    }

    async fn scan(&self) -> Result<Vec<Entry>> {
        let prefix = self.prefix_path().map_err(|e| {
            GalleryError::ScanFailed(format!("無効なプレフィックス {}: {}", self.prefix, e))
        })?;

        // デリミタ付き列挙: 直下のオブジェクトのみ（サブプレフィックスは common_prefixes 側）
        let listing = self
            .store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| GalleryError::ScanFailed(format!("{}: {}", self.describe(), e)))?;

        let mut entries: Vec<Entry> = listing
            .objects
            .into_iter()
            .filter_map(|meta| {
                let key = meta.location.as_ref();
                let relative = self.relative_path(key)?;
                // ディレクトリマーカーや深い階層は除外
                if relative.contains('/') {
                    return None;
                }
                let name = meta.location.filename()?;
                if !is_listable_image(name) {
                    return None;
                }
                Some(Entry {
                    id: key.to_string(),
                    name: name.to_string(),
                    path: relative.to_string(),
                    size: meta.size as u64,
                    modified_at: meta.last_modified,
                })
            })
            .collect();

        sort_newest_first(&mut entries);

        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let location = self.location(path)?;
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| GalleryError::from_object_store(e, path))?;
        Ok(result.bytes().await?)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let location = self.location(path)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(GalleryError::ObjectStore(e)),
        }
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let location = self.location(path)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type_for(path).into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(data), options)
            .await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let location = self.location(path)?;
        // S3 の DELETE は存在しなくても成功するため先に確認
        self.store
            .head(&location)
            .await
            .map_err(|e| GalleryError::from_object_store(e, path))?;
        self.store.delete(&location).await?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let src = self.location(from)?;
        let dest = self.location(to)?;
        self.store
            .rename(&src, &dest)
            .await
            .map_err(|e| GalleryError::from_object_store(e, from))
    }

    fn thumbnail_identifier(&self, path: &str) -> Result<String> {
        let location = self.location(path)?;
        Ok(format!("{}/{}", self.bucket, location))
    }

    async fn thumbnail_source(&self, path: &str) -> Result<ThumbnailSource> {
        Ok(ThumbnailSource::Bytes(self.read(path).await?))
    }

    // 署名付きGET URL（存在確認はしない）
    async fn original_url(&self, path: &str) -> Result<Option<String>> {
        let location = self.location(path)?;
        let Some(signer) = &self.signer else {
            return Ok(None);
        };
        let url = signer
            .signed_url(Method::GET, &location, ORIGINAL_URL_EXPIRY)
            .await?;
        Ok(Some(url.to_string()))
    }
}
