//! パスワードから認証情報を導出・検証する
//!
//! Argon2id（ランダムソルト付き）の PHC 文字列を認証情報として保存します。
//! 照合は Argon2 側の定数時間比較で行います。

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use crate::error::StoreError;

/// 生パスワードから認証情報（PHC 文字列）を導出
pub fn derive_credential(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Credential(e.to_string()))
}

/// 認証情報とパスワードを照合
///
/// 解析できない認証情報は不一致として扱う。
pub fn verify_credential(password: &str, credential: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(credential) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// 導出済みの認証情報かどうか（旧形式の平文パスワードとの判別用）
pub fn is_derived_credential(credential: &str) -> bool {
    credential.starts_with("$argon2") && PasswordHash::new(credential).is_ok()
}
