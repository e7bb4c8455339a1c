//! モデル推論機能
//!
//! パイプラインは `ClassifierModel` トレイト越しにモデルを呼び出すため、
//! テストでは代替モデルに差し替えられます。

use std::path::Path;
use std::sync::Arc;

use crate::error::{ClassificationError, ModelLoadError};
use crate::ml::preprocess::PixelTensor;
use crate::model::DeviceType;

/// 画像分類モデル
pub trait ClassifierModel: Send + Sync {
    /// 出力クラス数
    fn num_classes(&self) -> usize;

    /// (1, 160, 160, 3) のテンソルからクラス確率（長さ num_classes）を計算
    fn predict(&self, input: &PixelTensor) -> Result<Vec<f32>, ClassificationError>;
}

#[cfg(feature = "ml")]
pub use burn_engine::{export_model, BurnClassifier};

/// 設定されたデバイスでモデルアーカイブを読み込む
#[cfg(feature = "ml")]
pub fn load_classifier(
    model_path: &Path,
    device_type: DeviceType,
) -> Result<Arc<dyn ClassifierModel>, ModelLoadError> {
    use burn::backend::{NdArray, Wgpu};

    tracing::info!("[load_classifier] デバイス: {}", device_type);
    let model: Arc<dyn ClassifierModel> = match device_type {
        DeviceType::Wgpu => Arc::new(BurnClassifier::<Wgpu>::load(model_path, Default::default())?),
        DeviceType::Cpu => Arc::new(BurnClassifier::<NdArray>::load(model_path, Default::default())?),
    };
    Ok(model)
}

#[cfg(not(feature = "ml"))]
pub fn load_classifier(
    _model_path: &Path,
    _device_type: DeviceType,
) -> Result<Arc<dyn ClassifierModel>, ModelLoadError> {
    Err(ModelLoadError::Unsupported)
}

#[cfg(feature = "ml")]
mod burn_engine {
    use anyhow::Result;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use burn::{
        module::Module,
        record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
        tensor::{backend::Backend, Tensor, TensorData},
    };
    use tracing::info;

    use super::ClassifierModel;
    use crate::error::{ClassificationError, ModelLoadError};
    use crate::ml::ml_model::{LeafClassifier, LeafClassifierConfig, LeafClassifierRecord};
    use crate::ml::preprocess::PixelTensor;
    use crate::model::model_metadata::expected_input_contract;
    use crate::model::{load_model_with_metadata, save_model_with_metadata, ModelMetadata};

    /// Burn モデルによる推論エンジン
    pub struct BurnClassifier<B: Backend> {
        // バックエンドによっては Sync でないためロックで包む
        model: Mutex<LeafClassifier<B>>,
        metadata: ModelMetadata,
        device: B::Device,
    }

    impl<B: Backend> BurnClassifier<B> {
        /// モデルアーカイブを読み込んで推論エンジンを初期化
        pub fn load(model_path: &Path, device: B::Device) -> Result<Self, ModelLoadError> {
            let archive_err = |reason: String| ModelLoadError::Archive {
                path: model_path.to_path_buf(),
                reason,
            };

            let (metadata, model_binary) =
                load_model_with_metadata(model_path).map_err(|e| archive_err(format!("{:#}", e)))?;

            if !metadata.input_contract_matches() {
                return Err(ModelLoadError::InputContract {
                    expected: expected_input_contract(),
                    actual: metadata.input_contract(),
                });
            }
            if metadata.num_classes == 0 {
                return Err(ModelLoadError::InvalidClassCount(0));
            }

            let model = LeafClassifierConfig::new(metadata.num_classes).init::<B>(&device);

            // モデルの重みを復元
            let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
            let record: LeafClassifierRecord<B> = recorder
                .load(model_binary, &device)
                .map_err(|e| ModelLoadError::Weights(format!("{:?}", e)))?;
            let model = model.load_record(record);

            if model.num_outputs() != metadata.num_classes {
                return Err(ModelLoadError::Weights(format!(
                    "出力次元 {} がメタデータのクラス数 {} と一致しません",
                    model.num_outputs(),
                    metadata.num_classes
                )));
            }

            info!(
                "[BurnClassifier] モデルを読み込みました: {} ({}クラス)",
                model_path.display(),
                metadata.num_classes
            );

            Ok(Self::from_model(model, metadata, device))
        }

        /// 初期化済みのモデルから推論エンジンを作成
        pub fn from_model(model: LeafClassifier<B>, metadata: ModelMetadata, device: B::Device) -> Self {
            Self {
                model: Mutex::new(model),
                metadata,
                device,
            }
        }

        pub fn metadata(&self) -> &ModelMetadata {
            &self.metadata
        }
    }

    impl<B: Backend> ClassifierModel for BurnClassifier<B> {
        fn num_classes(&self) -> usize {
            self.metadata.num_classes
        }

        fn predict(&self, input: &PixelTensor) -> Result<Vec<f32>, ClassificationError> {
            let data = TensorData::new(input.as_slice().to_vec(), input.shape());
            let tensor = Tensor::<B, 4>::from_data(data, &self.device);

            let model = self
                .model
                .lock()
                .map_err(|_| ClassificationError::Inference("モデルのロックが破損しています".to_string()))?;
            let probabilities = model.predict_nhwc(tensor);

            probabilities
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| ClassificationError::Inference(format!("推論結果の取得エラー: {:?}", e)))
        }
    }

    /// モデルの重みをメタデータと共にアーカイブへ書き出す
    pub fn export_model<B: Backend>(
        model: LeafClassifier<B>,
        metadata: &ModelMetadata,
        output_path: &Path,
    ) -> Result<PathBuf> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let model_binary = <BinBytesRecorder<FullPrecisionSettings> as Recorder<B>>::record(
            &recorder,
            model.into_record(),
            (),
        )
        .map_err(|e| anyhow::anyhow!("モデル重みの書き出しエラー: {:?}", e))?;

        save_model_with_metadata(output_path, metadata, &model_binary)
    }
}

#[cfg(all(test, feature = "ml"))]
mod tests {
    use super::*;
    use crate::ml::ml_model::{LeafClassifierConfig, ARCHITECTURE};
    use crate::model::ModelMetadata;
    use burn::backend::NdArray;
    use image::{DynamicImage, Rgb, RgbImage};
    use tempfile::tempdir;

    fn sample_tensor() -> PixelTensor {
        let image = RgbImage::from_fn(200, 150, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        PixelTensor::from_image(&DynamicImage::ImageRgb8(image))
    }

    #[test]
    fn test_export_load_and_predict() {
        let dir = tempdir().unwrap();
        let device = Default::default();
        let model = LeafClassifierConfig::new(4).init::<NdArray>(&device);
        let metadata = ModelMetadata::new(4, ARCHITECTURE);

        let path = export_model(model, &metadata, &dir.path().join("leaf.tar.gz")).unwrap();
        let classifier = BurnClassifier::<NdArray>::load(&path, device).unwrap();

        assert_eq!(classifier.num_classes(), 4);
        assert_eq!(classifier.metadata().architecture, ARCHITECTURE);

        let input = sample_tensor();
        let first = classifier.predict(&input).unwrap();
        let second = classifier.predict(&input).unwrap();

        assert_eq!(first.len(), 4);
        assert!((first.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_rejects_wrong_input_contract() {
        let dir = tempdir().unwrap();
        let device = Default::default();
        let model = LeafClassifierConfig::new(2).init::<NdArray>(&device);
        let mut metadata = ModelMetadata::new(2, ARCHITECTURE);
        metadata.model_input_size = 224;

        let path = export_model(model, &metadata, &dir.path().join("wrong.tar.gz")).unwrap();
        let err = BurnClassifier::<NdArray>::load(&path, device).err().unwrap();
        assert!(matches!(err, ModelLoadError::InputContract { .. }));
    }

    #[test]
    fn test_load_rejects_mismatched_weights() {
        let dir = tempdir().unwrap();
        let device = Default::default();
        let model = LeafClassifierConfig::new(3).init::<NdArray>(&device);
        // 重みは3クラス分だがメタデータは5クラス
        let metadata = ModelMetadata::new(5, ARCHITECTURE);

        let path = export_model(model, &metadata, &dir.path().join("bad.tar.gz")).unwrap();
        assert!(BurnClassifier::<NdArray>::load(&path, device).is_err());
    }

    #[test]
    fn test_load_missing_archive() {
        let err = load_classifier(Path::new("missing/model.tar.gz"), DeviceType::Cpu)
            .err()
            .unwrap();
        assert!(matches!(err, ModelLoadError::Archive { .. }));
    }
}
