#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use filetime::{set_file_mtime, FileTime};
use photo_gallery_lib::{Backend, BackendKind, Clock, Entry, GalleryError, Result, ThumbnailSource};
use tokio::sync::Semaphore;

pub fn entry(name: &str, secs: i64) -> Entry {
    Entry {
        id: name.to_string(),
        name: name.to_string(),
        path: name.to_string(),
        size: 3,
        modified_at: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

pub fn touch(dir: &Path, name: &str, mtime: i64) {
    let path = dir.join(name);
    fs::write(&path, b"not really an image").unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
}

/// 実際にデコードできる PNG を書き出す
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    img.save(dir.join(name)).unwrap();
}

/// 手動で進める時計
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

/// スキャン回数を数え、必要ならスキャンを途中で止められるバックエンド
pub struct StubBackend {
    entries: Mutex<Vec<Entry>>,
    scans: AtomicUsize,
    fail_scan: AtomicBool,
    fail_delete: AtomicBool,
    gated: AtomicBool,
    release: Semaphore,
}

impl StubBackend {
    pub fn new(entries: Vec<Entry>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries),
            scans: AtomicUsize::new(0),
            fail_scan: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            release: Semaphore::new(0),
        })
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn push(&self, entry: Entry) {
        self.entries.lock().unwrap().insert(0, entry);
    }

    pub fn set_fail_scan(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// 以後のスキャンを release されるまで止める
    pub fn gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// 止めているスキャンを n 件進める
    pub fn release(&self, n: usize) {
        self.release.add_permits(n);
    }

    /// n 回目のスキャンが始まるまで待つ
    pub async fn wait_scans(&self, n: usize) {
        wait_until(|| self.scans() >= n).await;
    }

    fn find(&self, path: &str) -> Option<Entry> {
        self.entries.lock().unwrap().iter().find(|e| e.path == path).cloned()
    }
}

#[async_trait]
impl Backend for StubBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn describe(&self) -> String {
        "stub".to_string()
    }

    async fn scan(&self) -> Result<Vec<Entry>> {
        // 開始時点の内容を返す（スキャン中の変更は映らない）
        let entries = self.entries.lock().unwrap().clone();
        self.scans.fetch_add(1, Ordering::SeqCst);

        if self.gated.load(Ordering::SeqCst) {
            self.release.acquire().await.unwrap().forget();
        }

        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(GalleryError::ScanFailed("stub failure".to_string()));
        }
        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        self.find(path)
            .map(|_| Bytes::from_static(b"img"))
            .ok_or_else(|| GalleryError::NotFound(path.to_string()))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.find(path).is_some())
    }

    async fn put(&self, path: &str, _data: Bytes) -> Result<()> {
        self.push(entry(path, Utc::now().timestamp()));
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(GalleryError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )));
        }
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.path != path);
        if entries.len() == before {
            return Err(GalleryError::NotFound(path.to_string()));
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .iter_mut()
            .find(|e| e.path == from)
            .ok_or_else(|| GalleryError::NotFound(from.to_string()))?;
        entry.path = to.to_string();
        entry.id = to.to_string();
        Ok(())
    }

    fn thumbnail_identifier(&self, path: &str) -> Result<String> {
        Ok(format!("stub/{}", path))
    }

    async fn thumbnail_source(&self, path: &str) -> Result<ThumbnailSource> {
        Ok(ThumbnailSource::Bytes(self.read(path).await?))
    }
}

/// 条件が成り立つまで待つ（最大5秒）
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
