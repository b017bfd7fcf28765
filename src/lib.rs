mod backend;
mod cache;
mod commands;
mod config;
mod constants;
mod error;
mod image_utils;
mod logging;
mod state;
mod thumbnail;
mod types;

pub use backend::{Backend, BackendKind, LocalBackend, ObjectStoreBackend, S3Settings};
pub use cache::{
    Clock, ListingCache, ListingOptions, ListingSnapshot, RefreshOutcome, SystemClock,
    ThumbnailCache,
};
pub use commands::{MoveOutcome, MoveReport, MoveStatus, Original, ThumbnailResponse};
pub use config::{AliasConfig, CacheConfig, Config};
pub use constants::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, DEFAULT_PAGE_LIMIT, THUMBNAIL_SIZE};
pub use error::{GalleryError, Result};
pub use logging::init_logging;
pub use state::{AliasInfo, Gallery};
pub use thumbnail::{
    JpegThumbnailRenderer, ThumbnailRenderer, ThumbnailResult, ThumbnailSource, ThumbnailStatus,
};
pub use types::{Entry, Page};
