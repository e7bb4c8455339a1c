//! 画像の前処理
//!
//! 画像を読み込み、160x160 の RGB に最近傍法でリサイズして
//! (1, 160, 160, 3) のテンソルデータに変換します。

use image::{imageops::FilterType, DynamicImage};
use std::path::Path;

use crate::error::ClassificationError;
use crate::model::{MODEL_CHANNELS, MODEL_INPUT_SIZE};

/// リサイズ方式（学習時のローダーと同じ最近傍法。変更不可）
pub const RESAMPLE_FILTER: FilterType = FilterType::Nearest;

/// モデル入力テンソル (N, H, W, C) = (1, 160, 160, 3)
///
/// 画素値は正規化せず 0〜255 の f32 のまま保持する。
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTensor {
    data: Vec<f32>,
}

impl PixelTensor {
    pub const SHAPE: [usize; 4] = [
        1,
        MODEL_INPUT_SIZE as usize,
        MODEL_INPUT_SIZE as usize,
        MODEL_CHANNELS as usize,
    ];

    /// 要素数
    pub const LEN: usize = Self::SHAPE[0] * Self::SHAPE[1] * Self::SHAPE[2] * Self::SHAPE[3];

    /// 任意の画像からテンソルを作成（RGB変換・リサイズを含む）
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let resized = image::imageops::resize(&rgb, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, RESAMPLE_FILTER);

        // RgbImage の生バッファは HWC 順
        let data = resized.into_raw().into_iter().map(|v| v as f32).collect();
        Self { data }
    }

    /// 生データからテンソルを作成（長さが形状と一致しない場合は None）
    pub fn from_raw(data: Vec<f32>) -> Option<Self> {
        (data.len() == Self::LEN).then_some(Self { data })
    }

    pub fn shape(&self) -> [usize; 4] {
        Self::SHAPE
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// (y, x, c) の画素値
    pub fn pixel(&self, y: usize, x: usize, c: usize) -> f32 {
        let [_, _, w, ch] = Self::SHAPE;
        self.data[(y * w + x) * ch + c]
    }
}

/// 画像ファイルを読み込んでテンソルに変換
pub fn load_image_tensor(path: &Path) -> Result<PixelTensor, ClassificationError> {
    let image = image::open(path).map_err(|e| ClassificationError::ImageRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(PixelTensor::from_image(&image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn test_resize_to_model_shape() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 200, Rgb([10, 20, 30])));
        let tensor = PixelTensor::from_image(&image);

        assert_eq!(tensor.shape(), [1, 160, 160, 3]);
        assert_eq!(tensor.as_slice().len(), 160 * 160 * 3);
        assert_eq!(tensor.pixel(0, 0, 0), 10.0);
        assert_eq!(tensor.pixel(159, 159, 2), 30.0);
    }

    #[test]
    fn test_alpha_channel_dropped() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(160, 160, Rgba([200, 100, 50, 0])));
        let tensor = PixelTensor::from_image(&image);

        assert_eq!(tensor.pixel(80, 80, 0), 200.0);
        assert_eq!(tensor.pixel(80, 80, 1), 100.0);
        assert_eq!(tensor.pixel(80, 80, 2), 50.0);
    }

    #[test]
    fn test_nearest_keeps_hard_edges() {
        // 左半分が黒・右半分が白の画像を縮小しても中間色が出ない
        let image = RgbImage::from_fn(320, 320, |x, _| {
            if x < 160 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        let tensor = PixelTensor::from_image(&DynamicImage::ImageRgb8(image));

        assert!(tensor.as_slice().iter().all(|&v| v == 0.0 || v == 255.0));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_image_tensor(Path::new("no/such/leaf.jpg")).unwrap_err();
        assert!(matches!(err, ClassificationError::ImageRead { .. }));
    }

    #[test]
    fn test_load_undecodable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        std::fs::write(&path, b"this is not a png").unwrap();

        let err = load_image_tensor(&path).unwrap_err();
        assert!(matches!(err, ClassificationError::ImageRead { .. }));
    }

    #[test]
    fn test_from_raw_checks_length() {
        assert!(PixelTensor::from_raw(vec![0.0; PixelTensor::LEN]).is_some());
        assert!(PixelTensor::from_raw(vec![0.0; 10]).is_none());
    }
}
