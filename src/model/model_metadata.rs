//! モデルメタデータの定義と永続化
//!
//! tar.gz形式でモデルと関連するメタデータを保存・読み込みします。
//!
//! ## 入力仕様
//! - 入力テンソル: (1, 160, 160, 3) NHWC、画素値は 0〜255 の f32
//! - リサンプル: 最近傍（学習時のローダーと同じ）
//! - 出力: クラス数の長さの確率ベクトル

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// モデル入力サイズ（正方形）
pub const MODEL_INPUT_SIZE: u32 = 160;

/// 入力チャネル数（RGB）
pub const MODEL_CHANNELS: u32 = 3;

/// リサンプル方式の名前
pub const RESAMPLE_NEAREST: &str = "nearest";

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// 出力クラス数（ラベルカタログの件数と一致する必要がある）
    pub num_classes: usize,

    /// モデル入力サイズ（通常160x160）
    pub model_input_size: u32,

    /// 入力チャネル数
    #[serde(default = "default_channels")]
    pub channels: u32,

    /// 前処理のリサンプル方式
    #[serde(default = "default_resample")]
    pub resample: String,

    /// ネットワーク構成の名前
    #[serde(default)]
    pub architecture: String,

    /// 書き出し時刻（ISO8601形式）
    pub exported_at: String,
}

fn default_channels() -> u32 {
    MODEL_CHANNELS
}

fn default_resample() -> String {
    RESAMPLE_NEAREST.to_string()
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(num_classes: usize, architecture: &str) -> Self {
        Self {
            num_classes,
            model_input_size: MODEL_INPUT_SIZE,
            channels: MODEL_CHANNELS,
            resample: RESAMPLE_NEAREST.to_string(),
            architecture: architecture.to_string(),
            exported_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// パイプラインの入力仕様と一致するか
    pub fn input_contract_matches(&self) -> bool {
        self.model_input_size == MODEL_INPUT_SIZE
            && self.channels == MODEL_CHANNELS
            && self.resample == RESAMPLE_NEAREST
    }

    /// 入力仕様を表す文字列（エラー表示用）
    pub fn input_contract(&self) -> String {
        format!(
            "{}x{}x{} ({})",
            self.model_input_size, self.model_input_size, self.channels, self.resample
        )
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}

/// パイプラインが要求する入力仕様の文字列
pub fn expected_input_contract() -> String {
    format!(
        "{}x{}x{} ({})",
        MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, MODEL_CHANNELS, RESAMPLE_NEAREST
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metadata_matches_contract() {
        let metadata = ModelMetadata::new(38, "leaf_cnn_v1");
        assert!(metadata.input_contract_matches());
        assert_eq!(metadata.input_contract(), expected_input_contract());
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let json = r#"{"num_classes": 4, "model_input_size": 160, "exported_at": "2024-01-01T00:00:00Z"}"#;
        let metadata = ModelMetadata::from_json_string(json).unwrap();

        assert_eq!(metadata.channels, 3);
        assert_eq!(metadata.resample, "nearest");
        assert!(metadata.input_contract_matches());
    }

    #[test]
    fn test_wrong_input_size_detected() {
        let mut metadata = ModelMetadata::new(4, "leaf_cnn_v1");
        metadata.model_input_size = 224;
        assert!(!metadata.input_contract_matches());
    }
}
