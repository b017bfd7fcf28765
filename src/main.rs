use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use photo_gallery_lib::{init_logging, Config, Gallery, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
use serde::Serialize;
use tracing::warn;

// 一覧表示時に初回スキャンを待つ上限
const LIST_WAIT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "photo-gallery", version, about = "エイリアス単位の写真ブラウザ")]
struct Cli {
    /// 設定ファイル（YAML）
    #[arg(long, env = CONFIG_ENV_VAR, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// デバッグログを出力
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 登録済みエイリアスを表示
    Aliases,
    /// 一覧の1ページを JSON で表示
    List {
        alias: String,
        #[arg(long, default_value = "")]
        cursor: String,
        /// 0 なら既定のページサイズ
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// サムネイルを取得（必要なら生成）
    Thumb {
        alias: String,
        path: String,
        /// 書き出し先。省略時は結果だけ表示
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 元画像を取得（署名付きURLがあればURLを表示）
    Original {
        alias: String,
        path: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// ファイルをアップロード
    Upload { alias: String, file: PathBuf },
    /// ファイルを削除
    Delete { alias: String, path: String },
    /// ファイルを移動（エイリアス間も可）
    Move {
        alias: String,
        #[arg(required = true)]
        paths: Vec<String>,
        /// 移動先エイリアス
        #[arg(long)]
        to: String,
        /// 移動先ディレクトリ（相対パス）
        #[arg(long)]
        dir: Option<String>,
    },
    /// サムネイルキャッシュを全削除
    ClearThumbnails,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("設定ファイルを読み込めません: {}", cli.config.display()))?;
    let gallery = Gallery::connect(&config)
        .await
        .context("ギャラリーの初期化に失敗しました")?;

    match cli.command {
        Command::Aliases => print_json(&gallery.aliases())?,
        Command::List { alias, cursor, limit } => {
            if !gallery.wait_ready(&alias, LIST_WAIT).await? {
                warn!(alias = %alias, "初回スキャンが完了していません");
            }
            print_json(&gallery.list(&alias, &cursor, limit)?)?;
        }
        Command::Thumb { alias, path, output } => {
            let thumb = gallery.thumbnail(&alias, &path).await?;
            if let Some(output) = &output {
                tokio::fs::write(output, &thumb.body)
                    .await
                    .with_context(|| format!("書き出しに失敗しました: {}", output.display()))?;
            }
            print_json(&serde_json::json!({
                "cache_key": thumb.cache_key,
                "status": thumb.status,
                "content_type": thumb.content_type,
                "bytes": thumb.body.len(),
            }))?;
        }
        Command::Original { alias, path, output } => {
            if let Some(url) = gallery.original_url(&alias, &path).await? {
                println!("{}", url);
                return Ok(());
            }
            let original = gallery.original(&alias, &path).await?;
            if let Some(output) = &output {
                tokio::fs::write(output, &original.body)
                    .await
                    .with_context(|| format!("書き出しに失敗しました: {}", output.display()))?;
            }
            print_json(&serde_json::json!({
                "content_type": original.content_type,
                "bytes": original.body.len(),
            }))?;
        }
        Command::Upload { alias, file } => {
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("ファイル名を取得できません: {}", file.display()))?
                .to_string();
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("読み込みに失敗しました: {}", file.display()))?;
            let stored = gallery.upload(&alias, &filename, Bytes::from(data)).await?;
            println!("{}", stored);
        }
        Command::Delete { alias, path } => gallery.delete(&alias, &path).await?,
        Command::Move { alias, paths, to, dir } => {
            let report = gallery.move_photos(&alias, &paths, &to, dir.as_deref()).await?;
            print_json(&report)?;
        }
        Command::ClearThumbnails => {
            let removed = gallery.clear_thumbnail_cache().await?;
            println!("{}", removed);
        }
    }

    Ok(())
}
