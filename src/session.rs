//! 画面遷移とセッション状態の管理
//!
//! UI からの操作（Intent）を受け取り、現在の画面で許可されているかを判定して
//! 状態を遷移させます。遷移のたびに `SessionSnapshot` を watch チャネルへ送ります。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::account::AccountStore;
use crate::error::{AccountError, SessionError};
use crate::ml::{ClassificationPipeline, Prediction};
use crate::types::{Screen, SessionSnapshot, SignupForm, User};

/// セッション状態
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Login,
    Signup,
    Home {
        user: User,
        uploaded_image: Option<PathBuf>,
        last_prediction: Option<String>,
    },
}

impl SessionState {
    pub fn screen(&self) -> Screen {
        match self {
            SessionState::Login => Screen::Login,
            SessionState::Signup => Screen::Signup,
            SessionState::Home { .. } => Screen::Home,
        }
    }

    fn screen_name(&self) -> &'static str {
        match self {
            SessionState::Login => "login",
            SessionState::Signup => "signup",
            SessionState::Home { .. } => "home",
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        match self {
            SessionState::Home {
                user,
                uploaded_image,
                last_prediction,
            } => SessionSnapshot {
                screen: Screen::Home,
                user: Some(user.clone()),
                uploaded_image: uploaded_image.clone(),
                last_prediction: last_prediction.clone(),
            },
            other => SessionSnapshot {
                screen: other.screen(),
                ..SessionSnapshot::login()
            },
        }
    }
}

/// UI からの操作
#[derive(Debug, Clone)]
pub enum Intent {
    ShowSignup,
    ShowLogin,
    Login { username: String, password: String },
    Signup(SignupForm),
    Upload(PathBuf),
    Predict,
    Logout,
}

impl Intent {
    fn name(&self) -> &'static str {
        match self {
            Intent::ShowSignup => "show_signup",
            Intent::ShowLogin => "show_login",
            Intent::Login { .. } => "login",
            Intent::Signup(_) => "signup",
            Intent::Upload(_) => "upload",
            Intent::Predict => "predict",
            Intent::Logout => "logout",
        }
    }
}

/// 操作の結果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 画面が遷移した（または同じ画面のまま更新された）
    Screen(Screen),
    /// 分類結果
    Prediction(Prediction),
}

pub struct SessionController {
    accounts: Arc<AccountStore>,
    pipeline: Arc<ClassificationPipeline>,
    inference_timeout: Option<Duration>,
    state: SessionState,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    /// ログイン画面から開始するコントローラを作成
    pub fn new(accounts: Arc<AccountStore>, pipeline: Arc<ClassificationPipeline>) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::login());
        Self {
            accounts,
            pipeline,
            inference_timeout: None,
            state: SessionState::Login,
            snapshot_tx,
        }
    }

    pub fn with_inference_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.inference_timeout = timeout;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn screen(&self) -> Screen {
        self.state.screen()
    }

    pub fn current_user(&self) -> Option<&User> {
        match &self.state {
            SessionState::Home { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// スナップショットの購読
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.snapshot());
    }

    fn illegal(&self, intent: &Intent) -> SessionError {
        warn!(
            "[session] {} は {} 画面では実行できません",
            intent.name(),
            self.state.screen_name()
        );
        SessionError::IllegalTransition {
            intent: intent.name(),
            screen: self.state.screen_name(),
        }
    }

    /// ログイン画面 → サインアップ画面
    pub fn show_signup(&mut self) -> Result<Screen, SessionError> {
        match self.state {
            SessionState::Login => {
                self.set_state(SessionState::Signup);
                Ok(Screen::Signup)
            }
            _ => Err(self.illegal(&Intent::ShowSignup)),
        }
    }

    /// サインアップ画面 → ログイン画面
    pub fn show_login(&mut self) -> Result<Screen, SessionError> {
        match self.state {
            SessionState::Signup => {
                self.set_state(SessionState::Login);
                Ok(Screen::Login)
            }
            _ => Err(self.illegal(&Intent::ShowLogin)),
        }
    }

    /// ログイン。成功するとホーム画面へ遷移する
    pub fn login(&mut self, username: &str, password: &str) -> Result<&User, SessionError> {
        if self.state != SessionState::Login {
            return Err(self.illegal(&Intent::Login {
                username: username.to_string(),
                password: String::new(),
            }));
        }

        let user = match self.accounts.authenticate(username, password) {
            Ok(user) => user,
            Err(AccountError::Store(e)) => {
                error!("[login] ユーザーストアの読み込みに失敗しました: {}", e);
                return Err(SessionError::InvalidCredentials);
            }
            Err(e) => {
                info!("[login] ログイン失敗: {} ({})", username, e);
                return Err(SessionError::InvalidCredentials);
            }
        };

        self.set_state(SessionState::Home {
            user,
            uploaded_image: None,
            last_prediction: None,
        });

        match &self.state {
            SessionState::Home { user, .. } => Ok(user),
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    /// サインアップ。成功するとログイン画面へ戻る（自動ログインはしない）
    pub fn signup(&mut self, form: &SignupForm) -> Result<Screen, SessionError> {
        if self.state != SessionState::Signup {
            return Err(self.illegal(&Intent::Signup(SignupForm::default())));
        }

        match self.accounts.create_from_form(form) {
            Ok(()) => {
                self.set_state(SessionState::Login);
                Ok(Screen::Login)
            }
            Err(AccountError::DuplicateUsername(name)) => Err(SessionError::DuplicateUsername(name)),
            Err(AccountError::InvalidUsername) => Err(SessionError::InvalidUsername),
            Err(AccountError::InvalidCredentials) => Err(SessionError::InvalidCredentials),
            Err(AccountError::Store(e)) => {
                error!("[signup] ユーザーストアの更新に失敗しました: {}", e);
                Err(SessionError::InvalidCredentials)
            }
        }
    }

    /// 画像を選択。存在確認のみ行い、前回の分類結果は消去する
    pub fn upload(&mut self, image_path: PathBuf) -> Result<(), SessionError> {
        let SessionState::Home {
            uploaded_image,
            last_prediction,
            ..
        } = &mut self.state
        else {
            return Err(SessionError::NotAuthenticated);
        };

        if !image_path.is_file() {
            info!("[upload] ファイルが存在しません: {}", image_path.display());
            return Err(SessionError::ImageRead(image_path.display().to_string()));
        }

        info!("[upload] 画像を選択しました: {}", image_path.display());
        *uploaded_image = Some(image_path);
        *last_prediction = None;
        self.publish();
        Ok(())
    }

    /// 選択中の画像を分類する。状態はホーム画面のまま
    pub async fn predict(&mut self) -> Result<Prediction, SessionError> {
        let image_path = match &self.state {
            SessionState::Home {
                uploaded_image: Some(path),
                ..
            } => path.clone(),
            SessionState::Home { .. } => return Err(SessionError::NoImageSelected),
            _ => return Err(SessionError::NotAuthenticated),
        };

        let prediction = match self
            .pipeline
            .classify_async(image_path, self.inference_timeout)
            .await
        {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!("[predict] 分類に失敗しました: {}", e);
                return Err(e.into());
            }
        };

        info!(
            "[predict] {} (class {}, {:.1}%)",
            prediction.label,
            prediction.index,
            prediction.confidence * 100.0
        );

        if let SessionState::Home { last_prediction, .. } = &mut self.state {
            *last_prediction = Some(prediction.label.clone());
        }
        self.publish();
        Ok(prediction)
    }

    /// ログアウト。ユーザーと画像は無条件に破棄する
    pub fn logout(&mut self) -> Result<Screen, SessionError> {
        match &self.state {
            SessionState::Home { user, .. } => {
                info!("[logout] {}", user.username);
                self.set_state(SessionState::Login);
                Ok(Screen::Login)
            }
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    /// 任意の操作を実行
    pub async fn dispatch(&mut self, intent: Intent) -> Result<Outcome, SessionError> {
        match intent {
            Intent::ShowSignup => self.show_signup().map(Outcome::Screen),
            Intent::ShowLogin => self.show_login().map(Outcome::Screen),
            Intent::Login { username, password } => {
                self.login(&username, &password)?;
                Ok(Outcome::Screen(Screen::Home))
            }
            Intent::Signup(form) => self.signup(&form).map(Outcome::Screen),
            Intent::Upload(path) => {
                self.upload(path)?;
                Ok(Outcome::Screen(Screen::Home))
            }
            Intent::Predict => self.predict().await.map(Outcome::Prediction),
            Intent::Logout => self.logout().map(Outcome::Screen),
        }
    }
}
