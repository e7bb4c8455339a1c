//! エラー型の定義
//!
//! 起動時に致命的なもの（カタログ・モデル読み込み）と、
//! セッション境界で回復されるものを分けて定義します。

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// ユーザーストアの読み書きエラー
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("ユーザーストアの入出力エラー ({path:?}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ユーザーストアのJSON解析エラー ({path:?}): {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("パスワードハッシュの生成に失敗しました: {0}")]
    Credential(String),
}

/// アカウント操作のエラー
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("ユーザー名は既に使用されています: {0}")]
    DuplicateUsername(String),

    /// ユーザー名の不在とパスワード不一致を区別しない
    #[error("認証情報が正しくありません")]
    InvalidCredentials,

    #[error("ユーザー名が空です")]
    InvalidUsername,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// ラベルカタログの読み込みエラー（起動時に致命的）
#[derive(Error, Debug)]
pub enum CatalogLoadError {
    #[error("カタログファイルを読み込めません ({path:?}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("カタログのJSON解析エラー: {0}")]
    Format(#[from] serde_json::Error),

    #[error("カタログのキーがクラスインデックスではありません: {0:?}")]
    InvalidIndex(String),

    #[error("クラス {0} のラベルが空です")]
    EmptyLabel(usize),

    #[error("クラス {0} のラベルが複数のキーで定義されています")]
    DuplicateIndex(usize),

    #[error("クラス {index} のラベルがありません (モデルのクラス数: {num_classes})")]
    MissingLabel { index: usize, num_classes: usize },
}

/// モデル読み込みエラー（起動時に致命的）
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("モデルアーカイブを読み込めません ({path:?}): {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("モデルの入力形状が一致しません: {actual} (期待: {expected})")]
    InputContract { expected: String, actual: String },

    #[error("モデルのクラス数が不正です: {0}")]
    InvalidClassCount(usize),

    #[error("モデル重みの読み込みエラー: {0}")]
    Weights(String),

    #[error("このビルドでは機械学習機能が無効です (feature \"ml\")")]
    Unsupported,
}

/// 推論パイプラインのエラー
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("画像を読み込めません ({path:?}): {reason}")]
    ImageRead { path: PathBuf, reason: String },

    #[error("推論エラー: {0}")]
    Inference(String),

    #[error("推論結果が不正です: {0}")]
    InvalidOutput(String),

    #[error("推論が {0:?} 以内に完了しませんでした")]
    TimedOut(Duration),

    #[error("推論ワーカーが異常終了しました: {0}")]
    WorkerFailed(String),
}

/// 設定ファイルのエラー
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ファイルの入出力エラー ({path:?}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("設定ファイルのJSON解析エラー: {0}")]
    Format(#[from] serde_json::Error),
}

/// セッション境界で UI に返すエラー
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("duplicate username: {0}")]
    DuplicateUsername(String),

    #[error("username must not be empty")]
    InvalidUsername,

    #[error("no image selected")]
    NoImageSelected,

    #[error("image unreadable: {0}")]
    ImageRead(String),

    #[error("classification failed: {0}")]
    Classification(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("{intent} is not allowed on the {screen} screen")]
    IllegalTransition {
        intent: &'static str,
        screen: &'static str,
    },
}

impl SessionError {
    /// UI に表示する短いメッセージ（内部の詳細は含めない）
    pub fn user_message(&self) -> String {
        match self {
            SessionError::InvalidCredentials => "Invalid credentials.".to_string(),
            SessionError::DuplicateUsername(_) => "Username already exists.".to_string(),
            SessionError::InvalidUsername => "Please enter a username.".to_string(),
            SessionError::NoImageSelected => "Upload a leaf image first.".to_string(),
            SessionError::ImageRead(_) => "The selected file could not be read as an image.".to_string(),
            SessionError::Classification(_) => "Prediction failed. Please try again.".to_string(),
            SessionError::NotAuthenticated => "Please log in first.".to_string(),
            SessionError::IllegalTransition { .. } => "That action is not available here.".to_string(),
        }
    }
}

impl From<ClassificationError> for SessionError {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::ImageRead { reason, .. } => SessionError::ImageRead(reason),
            other => SessionError::Classification(other.to_string()),
        }
    }
}

/// 起動処理のエラー
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),

    #[error(transparent)]
    Model(#[from] ModelLoadError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_hide_details() {
        let err = SessionError::ImageRead("No such file or directory (os error 2)".to_string());
        assert!(!err.user_message().contains("os error"));

        let err = SessionError::DuplicateUsername("alice".to_string());
        assert_eq!(err.user_message(), "Username already exists.");
    }

    #[test]
    fn test_classification_error_conversion() {
        let err: SessionError = ClassificationError::ImageRead {
            path: PathBuf::from("leaf.png"),
            reason: "not found".to_string(),
        }
        .into();
        assert!(matches!(err, SessionError::ImageRead(_)));

        let err: SessionError = ClassificationError::TimedOut(Duration::from_secs(5)).into();
        assert!(matches!(err, SessionError::Classification(_)));
    }
}
