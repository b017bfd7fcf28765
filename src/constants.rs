use std::time::Duration;

// サムネイル設定（長辺px・JPEG品質）
pub const THUMBNAIL_SIZE: u32 = 400;
pub const THUMBNAIL_JPEG_QUALITY: u8 = 80;

// サムネイル配信時のヘッダ値
pub const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";
pub const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=86400";

// 画像サイズ制限（DoS防止）
pub const MAX_IMAGE_DIMENSION: u32 = 65535;      // 最大辺長
pub const MAX_PIXEL_COUNT: u64 = 100_000_000;    // 最大ピクセル数（100メガピクセル）

// 一覧に含める拡張子（小文字）
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "svg", "bmp"];

// 一覧キャッシュの鮮度（これを過ぎたらバックグラウンドで再スキャン）
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(20);

// limit 未指定（0）時のページサイズ
pub const DEFAULT_PAGE_LIMIT: usize = 50;

// スキャン中に invalidate された場合の再スキャン上限
pub const MAX_RESCAN_ATTEMPTS: usize = 3;

// オブジェクトストレージ接続設定
pub const OBJECT_STORE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const OBJECT_STORE_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// 元画像の署名付きURLの有効期限
pub const ORIGINAL_URL_EXPIRY: Duration = Duration::from_secs(3600);

// 設定ファイル
pub const DEFAULT_CONFIG_FILE: &str = "app-config.yaml";
pub const CONFIG_ENV_VAR: &str = "PHOTO_GALLERY_CONFIG";
