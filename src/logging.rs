use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// RUST_LOG が無ければこのフィルタ
const DEFAULT_FILTER: &str = "photo_gallery=info,photo_gallery_lib=info";
const VERBOSE_FILTER: &str = "photo_gallery=debug,photo_gallery_lib=debug";

/// ログ出力を初期化（標準エラーへ）。二回目以降の呼び出しは無視される
pub fn init_logging(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
