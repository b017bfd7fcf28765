//! 一覧キャッシュ（stale-while-revalidate）
//!
//! - 読み手はロックを一瞬取ってスナップショットの Arc を複製するだけで、
//!   スキャンの完了を待たない
//! - 鮮度切れを検知したら、実行中の更新が無いときに限り1件だけ
//!   バックグラウンド更新を起動する（single-flight、キューはしない）
//! - 更新成功時はスナップショットを丸ごと差し替える。失敗時は前回分を維持
//! - invalidate は空（未準備）に戻して即座に再スキャンを起動する

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use super::clock::{Clock, SystemClock};
use super::snapshot::ListingSnapshot;
use crate::backend::Backend;
use crate::constants::{DEFAULT_PAGE_LIMIT, FRESHNESS_WINDOW, MAX_RESCAN_ATTEMPTS};
use crate::error::{GalleryError, Result};
use crate::types::{Entry, Page};

/// 一覧キャッシュの動作設定
#[derive(Clone)]
pub struct ListingOptions {
    pub freshness_window: Duration,
    /// スキャン全体の期限。None なら無期限
    pub scan_timeout: Option<Duration>,
    pub clock: Arc<dyn Clock>,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            freshness_window: FRESHNESS_WINDOW,
            scan_timeout: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl ListingOptions {
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// 新しいスナップショットを公開（件数）
    Published(usize),
    /// 既に更新中だったため何もしなかった
    Skipped,
    /// スキャン失敗。前回のスナップショットを維持
    Failed,
}

struct Shared {
    label: String,
    backend: Arc<dyn Backend>,
    options: ListingOptions,
    snapshot: RwLock<Arc<ListingSnapshot>>,
    refreshing: AtomicBool,
    /// invalidate のたびに進める。スキャン開始時と公開時で比較する
    generation: AtomicU64,
    ready_tx: watch::Sender<bool>,
}

// 実行中フラグの所有権。drop で必ずフラグを下ろす
struct InFlight(Arc<Shared>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.refreshing.store(false, Ordering::Release);
    }
}

impl Shared {
    fn current(&self) -> Arc<ListingSnapshot> {
        // ロック内では Arc の読み書きしかしないので、poison されても中身は壊れていない
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn try_begin(shared: &Arc<Shared>) -> Option<InFlight> {
        shared
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(Arc::clone(shared)))
    }

    async fn scan(&self) -> Result<Vec<Entry>> {
        let scan = self.backend.scan();
        match self.options.scan_timeout {
            Some(limit) => tokio::time::timeout(limit, scan).await.map_err(|_| {
                GalleryError::ScanFailed(format!("スキャンがタイムアウトしました ({:?})", limit))
            })?,
            None => scan.await,
        }
    }

    // 結果と、最後に行ったスキャンの開始時点の世代を返す
    async fn run_refresh(&self) -> (RefreshOutcome, u64) {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let generation = self.generation.load(Ordering::Acquire);

            let entries = match self.scan().await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(alias = %self.label, error = %e, "一覧スキャン失敗（前回のスナップショットを維持）");
                    return (RefreshOutcome::Failed, generation);
                }
            };
            let count = entries.len();
            let snapshot = Arc::new(ListingSnapshot::new(entries, self.options.clock.now()));

            let published = {
                let mut current = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
                // スキャン中に invalidate された結果は変更前の内容かもしれない
                let invalidated = self.generation.load(Ordering::Acquire) != generation;
                if invalidated && attempt < MAX_RESCAN_ATTEMPTS {
                    false
                } else {
                    *current = snapshot;
                    self.ready_tx.send_replace(true);
                    true
                }
            };

            if published {
                info!(
                    alias = %self.label,
                    count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "一覧を更新"
                );
                return (RefreshOutcome::Published(count), generation);
            }

            debug!(alias = %self.label, attempt, "スキャン中に変更があったため再スキャン");
        }
    }

    // 更新を実行してフラグを下ろす。
    // 実行中の invalidate による起動要求は破棄されているので、世代が進んでいたら起動し直す
    async fn refresh_with(flight: InFlight) -> RefreshOutcome {
        let shared = Arc::clone(&flight.0);
        let (outcome, scanned) = shared.run_refresh().await;
        drop(flight);

        if shared.generation.load(Ordering::Acquire) != scanned {
            Shared::trigger(&shared);
        }
        outcome
    }

    // バックグラウンド更新を起動。起動したら true
    fn trigger(shared: &Arc<Shared>) -> bool {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(alias = %shared.label, "tokio ランタイム外のため更新を起動できません");
                return false;
            }
        };

        let Some(flight) = Shared::try_begin(shared) else {
            debug!(alias = %shared.label, "更新中のため起動要求を破棄");
            return false;
        };

        handle.spawn(Shared::refresh_with(flight));
        true
    }
}

/// バックエンド1つ分の一覧キャッシュ。複製しても同じ状態を共有する
#[derive(Clone)]
pub struct ListingCache {
    shared: Arc<Shared>,
}

impl ListingCache {
    /// 空（未準備）の状態で作成。スキャンは start() で開始
    pub fn new(label: impl Into<String>, backend: Arc<dyn Backend>, options: ListingOptions) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                label: label.into(),
                backend,
                options,
                snapshot: RwLock::new(Arc::new(ListingSnapshot::empty())),
                refreshing: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                ready_tx,
            }),
        }
    }

    /// 初回スキャンをバックグラウンドで開始
    pub fn start(&self) {
        Shared::trigger(&self.shared);
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.shared.backend
    }

    /// 現在のスナップショット（以後変更されない）
    pub fn snapshot(&self) -> Arc<ListingSnapshot> {
        self.shared.current()
    }

    pub fn is_refreshing(&self) -> bool {
        self.shared.refreshing.load(Ordering::Acquire)
    }

    /// 件数。未準備なら None
    pub fn total_count(&self) -> Option<usize> {
        let snapshot = self.shared.current();
        snapshot.is_ready().then(|| snapshot.len())
    }

    /// 現在のスナップショットからページを返す。スキャンは待たない。
    /// 鮮度切れなら副作用としてバックグラウンド更新を1件だけ起動する。
    /// limit が 0 の場合は既定のページサイズ
    pub fn get_page(&self, cursor: &str, limit: usize) -> Page {
        let snapshot = self.shared.current();
        let options = &self.shared.options;

        if snapshot.is_stale(options.clock.now(), options.freshness_window) {
            Shared::trigger(&self.shared);
        }

        let limit = if limit == 0 { DEFAULT_PAGE_LIMIT } else { limit };
        snapshot.page(cursor, limit)
    }

    /// 未準備に戻し、即座に再スキャンを起動する。
    /// 更新中だった場合はその更新が再スキャンしてから公開する
    pub fn invalidate(&self) {
        {
            let mut current = self.shared.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
            *current = Arc::new(ListingSnapshot::empty());
            self.shared.ready_tx.send_replace(false);
        }
        debug!(alias = %self.shared.label, "一覧キャッシュを無効化");
        Shared::trigger(&self.shared);
    }

    /// 更新をその場で実行して完了を待つ。既に更新中なら Skipped
    pub async fn refresh(&self) -> RefreshOutcome {
        match Shared::try_begin(&self.shared) {
            Some(flight) => Shared::refresh_with(flight).await,
            None => RefreshOutcome::Skipped,
        }
    }

    /// スナップショットが準備完了になるまで待つ
    pub async fn ready(&self) {
        let mut rx = self.shared.ready_tx.subscribe();
        // Sender は self が保持しているので閉じることはない
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::thumbnail::ThumbnailSource;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct EmptyBackend;

    #[async_trait]
    impl Backend for EmptyBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Local
        }
        fn describe(&self) -> String {
            "empty".to_string()
        }
        async fn scan(&self) -> Result<Vec<Entry>> {
            Ok(Vec::new())
        }
        async fn read(&self, path: &str) -> Result<Bytes> {
            Err(GalleryError::NotFound(path.to_string()))
        }
        async fn exists(&self, _path: &str) -> Result<bool> {
            Ok(false)
        }
        async fn put(&self, _path: &str, _data: Bytes) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, path: &str) -> Result<()> {
            Err(GalleryError::NotFound(path.to_string()))
        }
        async fn rename(&self, from: &str, _to: &str) -> Result<()> {
            Err(GalleryError::NotFound(from.to_string()))
        }
        fn thumbnail_identifier(&self, path: &str) -> Result<String> {
            Ok(path.to_string())
        }
        async fn thumbnail_source(&self, path: &str) -> Result<ThumbnailSource> {
            Err(GalleryError::NotFound(path.to_string()))
        }
    }

    #[test]
    fn get_page_outside_runtime_does_not_panic() {
        let cache = ListingCache::new("t", Arc::new(EmptyBackend), ListingOptions::default());
        let page = cache.get_page("", 10);
        assert!(page.entries.is_empty());
        assert!(!cache.is_refreshing());
    }

    #[tokio::test]
    async fn refresh_publishes_and_marks_ready() {
        let cache = ListingCache::new("t", Arc::new(EmptyBackend), ListingOptions::default());
        assert_eq!(cache.total_count(), None);

        assert_eq!(cache.refresh().await, RefreshOutcome::Published(0));
        assert!(cache.snapshot().is_ready());
        assert_eq!(cache.total_count(), Some(0));
        assert!(!cache.is_refreshing());
    }
}
