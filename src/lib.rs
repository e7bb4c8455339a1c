mod types;

// 植物病害判定のモジュール
pub mod account;
pub mod error;
pub mod logging;
pub mod ml;
pub mod model;
pub mod session;

pub use error::{
    AccountError, CatalogLoadError, ClassificationError, ConfigError, ModelLoadError, SessionError,
    StartupError, StoreError,
};
pub use session::{Intent, Outcome, SessionController, SessionState};
pub use types::{Screen, SessionSnapshot, SignupForm, User, UserRecord};

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use account::AccountStore;
use ml::{load_classifier, ClassificationPipeline, ClassifierModel};
use model::{AppConfig, LabelCatalog};

/// 起動時に構築される共有リソース
pub struct App {
    pub config: AppConfig,
    pub accounts: Arc<AccountStore>,
    pub pipeline: Arc<ClassificationPipeline>,
}

impl App {
    /// ログイン画面から始まる新しいセッション
    pub fn session(&self) -> SessionController {
        SessionController::new(Arc::clone(&self.accounts), Arc::clone(&self.pipeline))
            .with_inference_timeout(self.config.inference_timeout())
    }
}

/// 設定に従ってモデル・カタログ・ユーザーストアを準備する
///
/// カタログとモデルの読み込み失敗は致命的なので、画面を出す前にエラーを返す。
pub fn bootstrap(config: &AppConfig) -> Result<App, StartupError> {
    let model = load_classifier(Path::new(&config.model.model_path), config.device_type)?;
    assemble(config, model)
}

/// 読み込み済みのモデルから残りのリソースを組み立てる
pub fn assemble(config: &AppConfig, model: Arc<dyn ClassifierModel>) -> Result<App, StartupError> {
    let catalog = LabelCatalog::load(&config.catalog_path)?;
    info!(
        "[bootstrap] ラベルカタログを読み込みました: {} ({}件)",
        config.catalog_path,
        catalog.len()
    );

    let pipeline = ClassificationPipeline::new(model, Arc::new(catalog))?;

    // ストアの中身が壊れていても起動は続ける（ログイン・サインアップ時に InvalidCredentials になる）
    let accounts = AccountStore::open(&config.user_store_path)?;
    if config.accounts.migrate_plaintext_passwords {
        match accounts.migrate_legacy_credentials() {
            Ok(0) => {}
            Ok(migrated) => warn!("[bootstrap] 平文パスワード {}件を変換しました", migrated),
            Err(e) => error!(
                "[bootstrap] ユーザーストアを移行できません ({}): {}",
                accounts.path().display(),
                e
            ),
        }
    }

    info!("[bootstrap] 起動準備完了 ({}クラス)", pipeline.num_classes());

    Ok(App {
        config: config.clone(),
        accounts: Arc::new(accounts),
        pipeline: Arc::new(pipeline),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::pipeline::tests::FixedModel;
    use std::fs;
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> AppConfig {
        AppConfig {
            catalog_path: dir.join("plant_disease.json").display().to_string(),
            user_store_path: dir.join("users.json").display().to_string(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_assemble_builds_app() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.catalog_path, r#"{"0": "healthy", "1": "blight"}"#).unwrap();

        let app = assemble(&config, Arc::new(FixedModel::peaked(2, 1))).unwrap();
        assert_eq!(app.pipeline.num_classes(), 2);
        assert!(Path::new(&config.user_store_path).exists());
        assert_eq!(app.session().screen(), Screen::Login);
    }

    #[test]
    fn test_catalog_gap_is_fatal() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.catalog_path, r#"{"0": "healthy", "2": "blight"}"#).unwrap();

        let err = assemble(&config, Arc::new(FixedModel::peaked(3, 0))).err().unwrap();
        assert!(matches!(err, StartupError::Catalog(CatalogLoadError::MissingLabel { index: 1, .. })));
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        let err = assemble(&config, Arc::new(FixedModel::peaked(2, 0))).err().unwrap();
        assert!(matches!(err, StartupError::Catalog(CatalogLoadError::Io { .. })));
    }

    #[test]
    fn test_legacy_passwords_migrated_at_startup() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.catalog_path, r#"{"0": "healthy", "1": "blight"}"#).unwrap();
        fs::write(
            &config.user_store_path,
            r#"{"bob": {"name": "Bob", "email": "b@x.com", "password": "hunter2", "plants": []}}"#,
        )
        .unwrap();

        let app = assemble(&config, Arc::new(FixedModel::peaked(2, 0))).unwrap();
        let stored = fs::read_to_string(&config.user_store_path).unwrap();
        assert!(!stored.contains("hunter2"));
        assert_eq!(app.accounts.authenticate("bob", "hunter2").unwrap().name, "Bob");
    }

    #[test]
    fn test_corrupt_store_does_not_abort_startup() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.catalog_path, r#"{"0": "healthy", "1": "blight"}"#).unwrap();
        fs::write(&config.user_store_path, "{ not json").unwrap();

        let app = assemble(&config, Arc::new(FixedModel::peaked(2, 0))).unwrap();
        let mut session = app.session();
        assert_eq!(session.screen(), Screen::Login);

        let err = session.login("bob", "hunter2").unwrap_err();
        assert!(matches!(err, SessionError::InvalidCredentials));
        // 壊れたファイルは上書きしない
        assert_eq!(fs::read_to_string(&config.user_store_path).unwrap(), "{ not json");
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.model.model_path = dir.path().join("missing.tar.gz").display().to_string();
        config.device_type = model::DeviceType::Cpu;

        let err = bootstrap(&config).err().unwrap();
        assert!(matches!(err, StartupError::Model(_)));
    }
}
