use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ユーザーストアに保存されるレコード
///
/// `password` には Argon2 の PHC 文字列（導出済みの認証情報）を保存する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub plants: Vec<String>,
}

/// 認証済みユーザー（認証情報は含まない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub name: String,
    pub email: String,
    pub plants: Vec<String>,
}

impl User {
    pub fn from_record(username: &str, record: &UserRecord) -> Self {
        Self {
            username: username.to_string(),
            name: record.name.clone(),
            email: record.email.clone(),
            plants: record.plants.clone(),
        }
    }
}

/// サインアップ画面の入力値
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub plants: Vec<String>,
}

impl SignupForm {
    /// カンマ区切りの作物リストを分解（空要素は除外、順序は維持）
    pub fn parse_plants(input: &str) -> Vec<String> {
        input
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }
}

// 画面
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Login,
    Signup,
    Home,
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Screen::Login => write!(f, "login"),
            Screen::Signup => write!(f, "signup"),
            Screen::Home => write!(f, "home"),
        }
    }
}

/// UI へ通知するセッションの表示用スナップショット
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub screen: Screen,
    pub user: Option<User>,
    pub uploaded_image: Option<PathBuf>,
    pub last_prediction: Option<String>,
}

impl SessionSnapshot {
    pub fn login() -> Self {
        Self {
            screen: Screen::Login,
            user: None,
            uploaded_image: None,
            last_prediction: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plants() {
        assert_eq!(
            SignupForm::parse_plants("tomato, basil ,,pepper"),
            vec!["tomato", "basil", "pepper"]
        );
        assert!(SignupForm::parse_plants("").is_empty());
        assert!(SignupForm::parse_plants(" , ").is_empty());
    }

    #[test]
    fn test_record_without_plants_deserializes() {
        let json = r#"{"name":"Bob","email":"b@x.com","password":"pw"}"#;
        let record: UserRecord = serde_json::from_str(json).unwrap();
        assert!(record.plants.is_empty());
    }
}
