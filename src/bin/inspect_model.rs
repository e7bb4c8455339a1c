//! モデルアーカイブの確認用バイナリ
//!
//! 使い方: inspect_model <model.tar.gz> [plant_disease.json] [leaf.jpg]

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use plant_disease_detector_lib::ml::{load_classifier, ClassificationPipeline};
use plant_disease_detector_lib::model::{format_metadata_info, load_metadata, DeviceType, LabelCatalog};
use std::sync::Arc;

/// argv が空の環境でも使えるプログラム名
fn program_name(args: &[String]) -> &str {
    args.first().map(String::as_str).unwrap_or("inspect_model")
}

fn main() -> Result<()> {
    println!("=== Model Inspector ===\n");

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        bail!("使い方: {} <model.tar.gz> [plant_disease.json] [leaf.jpg]", program_name(&args));
    }
    let model_path = PathBuf::from(&args[1]);
    let catalog_path = PathBuf::from(args.get(2).map(String::as_str).unwrap_or("plant_disease.json"));
    let image_path = args.get(3).map(PathBuf::from);

    // 1: メタデータ
    println!("1: モデルメタデータ");
    let metadata = load_metadata(&model_path)
        .with_context(|| format!("メタデータを読み込めません: {}", model_path.display()))?;
    println!("{}", format_metadata_info(&metadata));

    println!("\n{}\n", "=".repeat(50));

    // 2: カタログの網羅性
    println!("2: ラベルカタログ");
    let catalog = LabelCatalog::load(&catalog_path)
        .with_context(|| format!("カタログを読み込めません: {}", catalog_path.display()))?;
    match catalog.ensure_covers(metadata.num_classes) {
        Ok(()) => println!("✓ {}クラスすべてにラベルがあります", metadata.num_classes),
        Err(e) => eprintln!("✗ {}", e),
    }
    for (index, label) in catalog.iter() {
        let marker = if index < metadata.num_classes { " " } else { "-" };
        println!("  {} {:>3}: {}", marker, index, label);
    }
    if catalog.len() > metadata.num_classes {
        println!("  (\"-\" はモデルの出力範囲外のラベル)");
    }

    let Some(image_path) = image_path else {
        return Ok(());
    };

    println!("\n{}\n", "=".repeat(50));

    // 3: 1枚分類
    println!("3: 分類テスト (CPU)");
    let model = load_classifier(&model_path, DeviceType::Cpu)?;
    let pipeline = ClassificationPipeline::new(model, Arc::new(catalog))?;
    let prediction = pipeline.classify_detailed(&image_path)?;
    println!(
        "✓ {} -> {} (class {}, {:.1}%)",
        image_path.display(),
        prediction.label,
        prediction.index,
        prediction.confidence * 100.0
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_name_without_argv() {
        assert_eq!(program_name(&[]), "inspect_model");
        assert_eq!(program_name(&["bin/inspect".to_string()]), "bin/inspect");
    }
}
