//! 分類パイプライン
//!
//! 画像読み込み → リサイズ → テンソル化 → 推論 → argmax → ラベル変換 を
//! 1つの操作にまとめます。外部状態への書き込みはありません。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{CatalogLoadError, ClassificationError};
use crate::ml::inference::ClassifierModel;
use crate::ml::preprocess::load_image_tensor;
use crate::model::LabelCatalog;

/// 1枚の画像に対する分類結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 予測クラスインデックス
    pub index: usize,
    /// 病名ラベル
    pub label: String,
    /// 予測クラスの確率
    pub confidence: f32,
}

pub struct ClassificationPipeline {
    model: Arc<dyn ClassifierModel>,
    catalog: Arc<LabelCatalog>,
}

impl ClassificationPipeline {
    /// パイプラインを構築。カタログがモデルの全出力をカバーしていなければエラー
    pub fn new(model: Arc<dyn ClassifierModel>, catalog: Arc<LabelCatalog>) -> Result<Self, CatalogLoadError> {
        catalog.ensure_covers(model.num_classes())?;
        Ok(Self { model, catalog })
    }

    pub fn num_classes(&self) -> usize {
        self.model.num_classes()
    }

    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }

    /// 画像を分類してラベルを返す
    pub fn classify(&self, image_path: &Path) -> Result<String, ClassificationError> {
        self.classify_detailed(image_path).map(|p| p.label)
    }

    /// 画像を分類して予測の詳細を返す
    pub fn classify_detailed(&self, image_path: &Path) -> Result<Prediction, ClassificationError> {
        let started = Instant::now();

        let tensor = load_image_tensor(image_path)?;
        let probabilities = self.model.predict(&tensor)?;

        let num_classes = self.model.num_classes();
        if probabilities.len() != num_classes {
            return Err(ClassificationError::InvalidOutput(format!(
                "確率ベクトルの長さ {} がクラス数 {} と一致しません",
                probabilities.len(),
                num_classes
            )));
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(ClassificationError::InvalidOutput(
                "確率ベクトルに有限でない値が含まれています".to_string(),
            ));
        }

        let index = argmax(&probabilities)
            .ok_or_else(|| ClassificationError::InvalidOutput("確率ベクトルが空です".to_string()))?;
        let label = self.catalog.lookup(index).to_string();

        debug!(
            "[classify] {} -> {} (class {}, {:.1}ms)",
            image_path.display(),
            label,
            index,
            started.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Prediction {
            index,
            label,
            confidence: probabilities[index],
        })
    }

    /// ワーカースレッドで分類を実行して結果を待つ
    ///
    /// Future を破棄しても推論自体は中断されず、結果が捨てられるだけ。
    pub async fn classify_async(
        self: &Arc<Self>,
        image_path: PathBuf,
        timeout: Option<Duration>,
    ) -> Result<Prediction, ClassificationError> {
        let pipeline = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || pipeline.classify_detailed(&image_path));

        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    info!("[classify_async] タイムアウト ({:?})", limit);
                    return Err(ClassificationError::TimedOut(limit));
                }
            },
            None => task.await,
        };

        joined.map_err(|e| ClassificationError::WorkerFailed(e.to_string()))?
    }
}

/// 最大値のインデックス（同値の場合は小さいインデックス）
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, best_value)) if v <= best_value => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
