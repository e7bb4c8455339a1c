//! クラスインデックス -> 病名ラベルの対応表
//!
//! `{"0": "Apple___Apple_scab", "1": ...}` 形式の JSON から読み込みます。
//! 起動時に一度だけ読み込み、以降は読み取り専用です。

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::CatalogLoadError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCatalog {
    labels: BTreeMap<usize, String>,
}

impl LabelCatalog {
    /// ファイルからカタログを読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogLoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CatalogLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let catalog = Self::from_json_str(&content)?;
        info!(
            "[LabelCatalog] {}件のラベルを読み込みました: {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// JSON文字列からカタログを生成
    pub fn from_json_str(json: &str) -> Result<Self, CatalogLoadError> {
        let raw: BTreeMap<String, String> = serde_json::from_str(json)?;

        let mut labels = BTreeMap::new();
        for (key, label) in raw {
            let index: usize = key
                .trim()
                .parse()
                .map_err(|_| CatalogLoadError::InvalidIndex(key.clone()))?;
            if label.trim().is_empty() {
                return Err(CatalogLoadError::EmptyLabel(index));
            }
            // "3" と "03" のように同じインデックスを指すキーは設定ミス
            if labels.insert(index, label).is_some() {
                return Err(CatalogLoadError::DuplicateIndex(index));
            }
        }

        Ok(Self { labels })
    }

    /// ラベル一覧（インデックス順）からカタログを生成
    pub fn from_labels<I, S>(labels: I) -> Result<Self, CatalogLoadError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (index, label) in labels.into_iter().enumerate() {
            let label = label.into();
            if label.trim().is_empty() {
                return Err(CatalogLoadError::EmptyLabel(index));
            }
            map.insert(index, label);
        }
        Ok(Self { labels: map })
    }

    /// `0..num_classes` の全インデックスにラベルがあるか確認
    pub fn ensure_covers(&self, num_classes: usize) -> Result<(), CatalogLoadError> {
        match (0..num_classes).find(|index| !self.labels.contains_key(index)) {
            Some(index) => Err(CatalogLoadError::MissingLabel { index, num_classes }),
            None => Ok(()),
        }
    }

    /// ラベルを取得
    ///
    /// # Panics
    /// カタログに無いインデックスはプログラムの誤り。
    /// パイプラインは `ensure_covers` 済みの範囲しか渡さない。
    pub fn lookup(&self, index: usize) -> &str {
        match self.labels.get(&index) {
            Some(label) => label,
            None => panic!(
                "クラスインデックス {} はラベルカタログの範囲外です ({}件)",
                index,
                self.labels.len()
            ),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().map(|(i, l)| (*i, l.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let catalog = LabelCatalog::from_json_str(
            r#"{"0": "Apple___Apple_scab", "1": "Apple___healthy", "3": "Tomato_Early_Blight"}"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.lookup(3), "Tomato_Early_Blight");
        assert_eq!(catalog.get(2), None);
    }

    #[test]
    fn test_non_integer_key_rejected() {
        let err = LabelCatalog::from_json_str(r#"{"zero": "Apple___Apple_scab"}"#).unwrap_err();
        assert!(matches!(err, CatalogLoadError::InvalidIndex(ref k) if k == "zero"));

        let err = LabelCatalog::from_json_str(r#"{"-1": "Apple___Apple_scab"}"#).unwrap_err();
        assert!(matches!(err, CatalogLoadError::InvalidIndex(_)));
    }

    #[test]
    fn test_conflicting_keys_for_same_index_rejected() {
        let err = LabelCatalog::from_json_str(
            r#"{"03": "Tomato_Early_Blight", "3": "Potato_healthy", "0": "a", "1": "b", "2": "c"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogLoadError::DuplicateIndex(3)));

        let err = LabelCatalog::from_json_str(r#"{" 1": "a", "1": "b"}"#).unwrap_err();
        assert!(matches!(err, CatalogLoadError::DuplicateIndex(1)));
    }

    #[test]
    fn test_iter_in_index_order() {
        let catalog = LabelCatalog::from_json_str(r#"{"2": "c", "0": "a", "1": "b"}"#).unwrap();
        let entries: Vec<(usize, &str)> = catalog.iter().collect();
        assert_eq!(entries, vec![(0, "a"), (1, "b"), (2, "c")]);
    }

    #[test]
    fn test_empty_label_rejected() {
        let err = LabelCatalog::from_json_str(r#"{"0": "  "}"#).unwrap_err();
        assert!(matches!(err, CatalogLoadError::EmptyLabel(0)));
    }

    #[test]
    fn test_non_string_value_rejected() {
        let err = LabelCatalog::from_json_str(r#"{"0": 5}"#).unwrap_err();
        assert!(matches!(err, CatalogLoadError::Format(_)));
    }

    #[test]
    fn test_ensure_covers() {
        let catalog = LabelCatalog::from_json_str(r#"{"0": "a", "1": "b", "3": "d"}"#).unwrap();

        assert!(catalog.ensure_covers(2).is_ok());
        let err = catalog.ensure_covers(4).unwrap_err();
        assert!(matches!(err, CatalogLoadError::MissingLabel { index: 2, num_classes: 4 }));
    }

    #[test]
    fn test_lookup_total_over_covered_range() {
        let catalog = LabelCatalog::from_labels(["healthy", "early_blight", "late_blight"]).unwrap();
        catalog.ensure_covers(3).unwrap();

        for index in 0..3 {
            assert!(!catalog.lookup(index).is_empty());
        }
    }

    #[test]
    #[should_panic(expected = "範囲外")]
    fn test_lookup_out_of_range_panics() {
        let catalog = LabelCatalog::from_labels(["healthy"]).unwrap();
        catalog.lookup(7);
    }

    #[test]
    fn test_load_missing_file() {
        let err = LabelCatalog::load("does/not/exist.json").unwrap_err();
        assert!(matches!(err, CatalogLoadError::Io { .. }));
    }
}
