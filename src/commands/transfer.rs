use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};
use crate::backend::Backend;
use crate::cache::ListingCache;
use crate::error::{GalleryError, Result};
use crate::state::Gallery;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MoveStatus {
    Moved,
    /// 移動先への書き込みは成功したが、移動元の削除に失敗（両方に残っている）
    Copied { delete_error: String },
    Failed { error: String },
}

/// 1ファイル分の移動結果
#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    pub source: String,
    /// 移動先での相対パス（失敗時は None）
    pub destination: Option<String>,
    #[serde(flatten)]
    pub status: MoveStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MoveReport {
    pub outcomes: Vec<MoveOutcome>,
}

impl MoveReport {
    pub fn moved(&self) -> Vec<&str> {
        self.sources(|s| matches!(s, MoveStatus::Moved))
    }

    pub fn copied(&self) -> Vec<&str> {
        self.sources(|s| matches!(s, MoveStatus::Copied { .. }))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.sources(|s| matches!(s, MoveStatus::Failed { .. }))
    }

    fn sources(&self, pred: impl Fn(&MoveStatus) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| pred(&o.status))
            .map(|o| o.source.as_str())
            .collect()
    }
}

// クライアント指定の名前からファイル名部分だけを取り出す
fn base_name(name: &str) -> Result<String> {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(GalleryError::InvalidPath(name.to_string()));
    }
    Ok(base.to_string())
}

// foo.jpg → foo_1.jpg（拡張子の前に連番）
fn numbered_name(name: &str, n: usize) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], n, &name[dot..]),
        _ => format!("{}_{}", name, n),
    }
}

fn join_dir(dir: &str, name: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

// 既存と衝突しないパスを探す（name, name_1, name_2, ...）
async fn available_path(backend: &dyn Backend, dir: &str, name: &str) -> Result<String> {
    let candidate = join_dir(dir, name);
    if !backend.exists(&candidate).await? {
        return Ok(candidate);
    }

    let mut n = 1;
    loop {
        let candidate = join_dir(dir, &numbered_name(name, n));
        if !backend.exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn failed(source: &str, error: GalleryError) -> MoveOutcome {
    warn!(source, error = %error, "移動失敗");
    MoveOutcome {
        source: source.to_string(),
        destination: None,
        status: MoveStatus::Failed {
            error: error.to_string(),
        },
    }
}

// 同一エイリアス内: リネーム
async fn move_within(listing: &ListingCache, path: &str, dest_dir: &str) -> MoveOutcome {
    let target = match base_name(path) {
        Ok(name) => join_dir(dest_dir, &name),
        Err(e) => return failed(path, e),
    };

    // 同じ場所への移動は何もしない（オブジェクトストレージではコピー後に削除されてしまう）
    if target != path {
        if let Err(e) = listing.backend().rename(path, &target).await {
            return failed(path, e);
        }
    }

    MoveOutcome {
        source: path.to_string(),
        destination: Some(target),
        status: MoveStatus::Moved,
    }
}

// エイリアス間: 読み込み → 衝突回避して書き込み → 移動元を削除
async fn move_across(
    source: &ListingCache,
    dest: &ListingCache,
    path: &str,
    dest_dir: &str,
) -> MoveOutcome {
    let copied = async {
        let name = base_name(path)?;
        let data = source.backend().read(path).await?;
        let target = available_path(dest.backend().as_ref(), dest_dir, &name).await?;
        dest.backend().put(&target, data).await?;
        Ok::<_, GalleryError>(target)
    }
    .await;

    let target = match copied {
        Ok(target) => target,
        Err(e) => return failed(path, e),
    };

    let status = match source.backend().delete(path).await {
        Ok(()) => MoveStatus::Moved,
        Err(e) => {
            warn!(source = path, error = %e, "コピー後の移動元削除に失敗");
            MoveStatus::Copied {
                delete_error: e.to_string(),
            }
        }
    };

    MoveOutcome {
        source: path.to_string(),
        destination: Some(target),
        status,
    }
}

impl Gallery {
    /// アップロード。同名があれば name_1, name_2, ... に付け替え、保存先パスを返す
    pub async fn upload(&self, alias: &str, filename: &str, data: Bytes) -> Result<String> {
        let listing = self.listing(alias)?;

        let result = async {
            let name = base_name(filename)?;
            let target = available_path(listing.backend().as_ref(), "", &name).await?;
            listing.backend().put(&target, data).await?;
            Ok::<_, GalleryError>(target)
        }
        .await;

        listing.invalidate();

        if let Ok(target) = &result {
            info!(alias, path = %target, "アップロード");
        }
        result
    }

    pub async fn delete(&self, alias: &str, path: &str) -> Result<()> {
        let listing = self.listing(alias)?;
        let result = listing.backend().delete(path).await;
        listing.invalidate();

        if result.is_ok() {
            info!(alias, path, "削除");
        }
        result
    }

    /// 複数ファイルの移動。個々の失敗はレポートに記録して続行する
    pub async fn move_photos(
        &self,
        alias: &str,
        paths: &[String],
        dest_alias: &str,
        dest_dir: Option<&str>,
    ) -> Result<MoveReport> {
        let source = self.listing(alias)?;
        let dest = self.listing(dest_alias)?;
        let dest_dir = dest_dir.unwrap_or_default();
        let same_alias = alias == dest_alias;

        let mut report = MoveReport::default();
        for path in paths {
            let outcome = if same_alias {
                move_within(&source, path, dest_dir).await
            } else {
                move_across(&source, &dest, path, dest_dir).await
            };
            report.outcomes.push(outcome);
        }

        source.invalidate();
        if !same_alias {
            dest.invalidate();
        }

        info!(
            alias,
            dest_alias,
            moved = report.moved().len(),
            copied = report.copied().len(),
            failed = report.failed().len(),
            "移動完了"
        );
        Ok(report)
    }
}
