//! アプリケーション設定管理モジュール
//!
//! 計算デバイスやファイルパス、推論設定などをJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ConfigError;

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    #[default]
    Wgpu,
    /// NdArray (CPU) バックエンド
    Cpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// 使用するモデルアーカイブのパス
    pub model_path: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/plant_disease_recog.tar.gz".to_string(),
        }
    }
}

/// 推論設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// 推論のタイムアウト（秒）。None なら無制限
    pub timeout_secs: Option<u64>,
}

/// アカウント設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    /// 起動時に平文パスワードを認証情報へ変換する
    pub migrate_plaintext_passwords: bool,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            migrate_plaintext_passwords: true,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 計算デバイスの種類
    pub device_type: DeviceType,
    /// モデル設定
    pub model: ModelSettings,
    /// ラベルカタログのパス
    pub catalog_path: String,
    /// ユーザーストアのパス
    pub user_store_path: String,
    /// 推論設定
    pub inference: InferenceSettings,
    /// アカウント設定
    pub accounts: AccountSettings,
    /// ログレベル（RUST_LOG が優先）
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device_type: DeviceType::default(),
            model: ModelSettings::default(),
            catalog_path: "plant_disease.json".to_string(),
            user_store_path: "users.json".to_string(),
            inference: InferenceSettings::default(),
            accounts: AccountSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 設定を読み込む。存在しない・壊れている場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// 推論タイムアウト
    pub fn inference_timeout(&self) -> Option<std::time::Duration> {
        self.inference
            .timeout_secs
            .map(std::time::Duration::from_secs)
    }

    /// 設定情報を文字列に整形
    pub fn describe(&self) -> String {
        let timeout = match self.inference.timeout_secs {
            Some(secs) => format!("{}秒", secs),
            None => "なし".to_string(),
        };
        format!(
            "計算デバイス: {}\nモデル: {}\nラベルカタログ: {}\nユーザーストア: {}\n推論タイムアウト: {}",
            self.device_type, self.model.model_path, self.catalog_path, self.user_store_path, timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.device_type, DeviceType::Wgpu);
        assert_eq!(config.catalog_path, "plant_disease.json");
        assert_eq!(config.user_store_path, "users.json");
        assert!(config.inference_timeout().is_none());
        assert!(config.accounts.migrate_plaintext_passwords);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"device_type": "Cpu", "inference": {"timeout_secs": 30}}"#).unwrap();

        assert_eq!(config.device_type, DeviceType::Cpu);
        assert_eq!(config.inference_timeout(), Some(std::time::Duration::from_secs(30)));
        assert_eq!(config.model.model_path, "models/plant_disease_recog.tar.gz");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.device_type = DeviceType::Cpu;
        config.user_store_path = "data/users.json".to_string();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.device_type, DeviceType::Cpu);
        assert_eq!(loaded.user_store_path, "data/users.json");
    }

    #[test]
    fn test_malformed_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ broken").unwrap();

        assert!(AppConfig::load(&path).is_err());
        let config = AppConfig::load_or_default(&path);
        assert_eq!(config.catalog_path, "plant_disease.json");
    }

    #[test]
    fn test_device_type_display() {
        assert_eq!(format!("{}", DeviceType::Wgpu), "WGPU (GPU)");
        assert_eq!(format!("{}", DeviceType::Cpu), "CPU (NdArray)");
    }
}
