//! 葉画像分類用のCNNモデル定義
//!
//! 160x160 の葉画像を病名クラスに分類するネットワークです。

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

/// ネットワーク構成の名前（メタデータに記録）
pub const ARCHITECTURE: &str = "leaf_cnn_v1";

/// モデル設定
#[derive(Config, Debug)]
pub struct LeafClassifierConfig {
    /// 分類クラス数
    pub num_classes: usize,
    /// 全結合層の中間次元
    #[config(default = 64)]
    pub hidden_size: usize,
}

impl LeafClassifierConfig {
    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> LeafClassifier<B> {
        // 160 -> Conv1 158 -> Pool1 79 -> Conv2 77 -> Pool2 38 -> Conv3 36 -> GAP 1
        LeafClassifier {
            conv1: Conv2dConfig::new([3, 32], [3, 3]).with_stride([1, 1]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            conv2: Conv2dConfig::new([32, 64], [3, 3]).with_stride([1, 1]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            conv3: Conv2dConfig::new([64, 128], [3, 3]).with_stride([1, 1]).init(device),
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: LinearConfig::new(128, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

/// 葉画像分類用CNNモデル
///
/// # アーキテクチャ
/// - 画素値を [0, 1] にスケーリング
/// - {Conv 3x3 + ReLU + MaxPool 2x2} x 2層
/// - Conv 3x3 + ReLU
/// - Global Average Pooling
/// - FC: 128 -> hidden + ReLU
/// - FC: hidden -> num_classes
/// - Softmax (推論時)
#[derive(Module, Debug)]
pub struct LeafClassifier<B: Backend> {
    conv1: Conv2d<B>,  // 3 -> 32
    pool1: MaxPool2d,
    conv2: Conv2d<B>,  // 32 -> 64
    pool2: MaxPool2d,
    conv3: Conv2d<B>,  // 64 -> 128
    global_pool: AdaptiveAvgPool2d,

    fc1: Linear<B>,
    fc2: Linear<B>,

    activation: Relu,
}

impl<B: Backend> LeafClassifier<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, 3, size, size]（画素値 0〜255）
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = images.div_scalar(255.0);

        let x = self.conv1.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.conv3.forward(x);
        let x = self.activation.forward(x);

        // [B, C, 1, 1] -> [B, C]
        let x = self.global_pool.forward(x);
        let [_, c, _, _] = x.dims();
        let x = x.reshape([batch_size, c]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);

        self.fc2.forward(x)
    }

    /// NHWC 入力から確率を計算
    ///
    /// # 引数
    /// - `images`: [batch_size, size, size, 3]
    ///
    /// # 戻り値
    /// - クラス確率 [batch_size, num_classes]
    pub fn predict_nhwc(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let images = images.permute([0, 3, 1, 2]);
        softmax(self.forward(images), 1)
    }

    /// 出力層の次元（読み込んだ重みの検証用）
    pub fn num_outputs(&self) -> usize {
        let [_, d_output] = self.fc2.weight.val().dims();
        d_output
    }
}
