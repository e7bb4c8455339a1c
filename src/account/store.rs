//! ユーザーストアの永続化
//!
//! ユーザー名をキーとした JSON オブジェクトを1ファイルに保存します。
//! 更新は「読み込み → 変更 → 保存」を1つのロック内で行い、
//! 保存は同じディレクトリの一時ファイルに書いてから rename で置き換えます。

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::account::password::{derive_credential, is_derived_credential, verify_credential};
use crate::error::{AccountError, StoreError};
use crate::types::{SignupForm, User, UserRecord};

/// ユーザー名 -> レコード
pub type UserMap = BTreeMap<String, UserRecord>;

pub struct AccountStore {
    path: PathBuf,
    // 読み込み〜保存の間の排他（ユーザー名の一意性を守る）
    write_lock: Mutex<()>,
}

impl AccountStore {
    /// ストアを開く。ファイルが無ければ空のオブジェクトで初期化する
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        };

        if !store.path.exists() {
            if let Some(parent) = store.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
            }
            store.save(&UserMap::new())?;
            info!("[AccountStore] ユーザーストアを作成しました: {}", store.path.display());
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 全レコードを読み込む（ファイルが無い・空の場合は空のマップ）
    pub fn load(&self) -> Result<UserMap, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UserMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(UserMap::new());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })
    }

    /// 全レコードを原子的に保存する
    fn save(&self, users: &UserMap) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // 元のファイルと同じ4スペースインデント
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        users
            .serialize(&mut serializer)
            .map_err(|source| StoreError::Format {
                path: self.path.clone(),
                source,
            })?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        temp.write_all(&buffer).map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!("[AccountStore] 保存完了 - {}件", users.len());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // 保護対象はファイルなので、poison されていてもそのまま続行する
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// アカウントを作成
    pub fn create_account(
        &self,
        username: &str,
        name: &str,
        email: &str,
        password: &str,
        plants: Vec<String>,
    ) -> Result<(), AccountError> {
        if username.is_empty() {
            return Err(AccountError::InvalidUsername);
        }

        let _guard = self.lock();
        let mut users = self.load()?;

        if users.contains_key(username) {
            info!("[create_account] ユーザー名が重複しています: {}", username);
            return Err(AccountError::DuplicateUsername(username.to_string()));
        }

        let record = UserRecord {
            name: name.to_string(),
            email: email.to_string(),
            password: derive_credential(password)?,
            plants,
        };
        users.insert(username.to_string(), record);
        self.save(&users)?;

        info!("[create_account] アカウントを作成しました: {}", username);
        Ok(())
    }

    /// サインアップフォームからアカウントを作成
    pub fn create_from_form(&self, form: &SignupForm) -> Result<(), AccountError> {
        self.create_account(
            &form.username,
            &form.name,
            &form.email,
            &form.password,
            form.plants.clone(),
        )
    }

    /// 認証。ユーザー不在とパスワード不一致は同じエラーを返す
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, AccountError> {
        let users = self.load()?;

        match users.get(username) {
            Some(record) if verify_credential(password, &record.password) => {
                info!("[authenticate] ログイン成功: {}", username);
                Ok(User::from_record(username, record))
            }
            Some(_) => Err(AccountError::InvalidCredentials),
            None => {
                // 不在ユーザーでも照合を1回行い、応答時間を揃える
                if let Some(dummy) = dummy_credential() {
                    let _ = verify_credential(password, dummy);
                }
                Err(AccountError::InvalidCredentials)
            }
        }
    }

    /// 平文で保存された旧形式のパスワードを認証情報に置き換える
    ///
    /// 戻り値は置き換えたレコード数。
    pub fn migrate_legacy_credentials(&self) -> Result<usize, StoreError> {
        let _guard = self.lock();
        let mut users = self.load()?;

        let mut migrated = 0;
        for (username, record) in users.iter_mut() {
            if !is_derived_credential(&record.password) {
                record.password = derive_credential(&record.password)?;
                migrated += 1;
                warn!("[migrate] 平文パスワードを変換しました: {}", username);
            }
        }

        if migrated > 0 {
            self.save(&users)?;
            info!("[migrate] {}件のレコードを変換しました", migrated);
        }

        Ok(migrated)
    }

    pub fn contains(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.load()?.contains_key(username))
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.load()?.is_empty())
    }
}

fn dummy_credential() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| derive_credential("dummy-password").ok())
        .as_deref()
}
