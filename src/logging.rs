//! ログ出力の初期化
//!
//! `tracing_subscriber` の fmt サブスクライバを設定します。
//! 環境変数 `RUST_LOG` が設定されていれば設定ファイルのレベルより優先します。

use tracing_subscriber::EnvFilter;

/// ログを初期化（2回目以降の呼び出しは何もしない）
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("debug");
        init("not a level ===");
        tracing::info!("[logging] 初期化済み");
    }
}
