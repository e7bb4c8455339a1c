//! 植物病害判定アプリ（ターミナル版）
//!
//! 使い方: plant_disease_detector [config.json]

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use plant_disease_detector_lib::model::AppConfig;
use plant_disease_detector_lib::{bootstrap, logging, Screen, SessionController, SessionSnapshot, SignupForm};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);

    // ログレベルは設定ファイルに従うため、読み込み結果のログは初期化後に出る
    let config = AppConfig::load_or_default(&config_path);
    logging::init(&config.log_level);
    tracing::info!("[main] 設定\n{}", config.describe());

    let app = bootstrap(&config).context("起動に失敗しました")?;
    let mut session = app.session();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    println!("=== Plant Disease Detector ===");
    render(&session.snapshot());

    loop {
        let keep_going = match session.screen() {
            Screen::Login => login_screen(&mut session, &mut input).await?,
            Screen::Signup => signup_screen(&mut session, &mut input).await?,
            Screen::Home => home_screen(&mut session, &mut input).await?,
        };
        if !keep_going {
            break;
        }
    }

    println!("Bye.");
    Ok(())
}

async fn prompt(input: &mut Input, label: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;

    let line = input.next_line().await.context("標準入力の読み込みエラー")?;
    Ok(line.map(|l| l.trim().to_string()))
}

/// 入力が終わった（EOF）場合は None
async fn choose(input: &mut Input, menu: &str) -> Result<Option<String>> {
    println!("{}", menu);
    prompt(input, "> ").await
}

fn render(snapshot: &SessionSnapshot) {
    println!();
    match snapshot.screen {
        Screen::Login => println!("[Login]"),
        Screen::Signup => println!("[Sign up]"),
        Screen::Home => {
            if let Some(user) = &snapshot.user {
                println!("Welcome, {}!", user.name);
                if !user.plants.is_empty() {
                    println!("Your plants: {}", user.plants.join(", "));
                }
            }
            if let Some(image) = &snapshot.uploaded_image {
                println!("Image: {}", image.display());
            }
            if let Some(label) = &snapshot.last_prediction {
                println!("Prediction: {}", label);
            }
        }
    }
}

async fn login_screen(session: &mut SessionController, input: &mut Input) -> Result<bool> {
    let Some(choice) = choose(input, "(l) log in  (s) sign up  (q) quit").await? else {
        return Ok(false);
    };

    match choice.as_str() {
        "l" => {
            let Some(username) = prompt(input, "Username: ").await? else {
                return Ok(false);
            };
            let Some(password) = prompt(input, "Password: ").await? else {
                return Ok(false);
            };
            match session.login(&username, &password) {
                Ok(_) => render(&session.snapshot()),
                Err(e) => println!("{}", e.user_message()),
            }
        }
        "s" => {
            if let Err(e) = session.show_signup() {
                println!("{}", e.user_message());
            }
            render(&session.snapshot());
        }
        "q" => return Ok(false),
        other => println!("Unknown option: {}", other),
    }
    Ok(true)
}

async fn signup_screen(session: &mut SessionController, input: &mut Input) -> Result<bool> {
    let Some(choice) = choose(input, "(c) create account  (b) back to login  (q) quit").await? else {
        return Ok(false);
    };

    match choice.as_str() {
        "c" => {
            let mut fields = Vec::with_capacity(5);
            for label in ["Username: ", "Name: ", "Email: ", "Password: ", "Plants (comma separated): "] {
                match prompt(input, label).await? {
                    Some(value) => fields.push(value),
                    None => return Ok(false),
                }
            }
            let form = SignupForm {
                username: fields[0].clone(),
                name: fields[1].clone(),
                email: fields[2].clone(),
                password: fields[3].clone(),
                plants: SignupForm::parse_plants(&fields[4]),
            };
            match session.signup(&form) {
                Ok(_) => {
                    println!("Account created. Please log in.");
                    render(&session.snapshot());
                }
                Err(e) => println!("{}", e.user_message()),
            }
        }
        "b" => {
            if let Err(e) = session.show_login() {
                println!("{}", e.user_message());
            }
            render(&session.snapshot());
        }
        "q" => return Ok(false),
        other => println!("Unknown option: {}", other),
    }
    Ok(true)
}

async fn home_screen(session: &mut SessionController, input: &mut Input) -> Result<bool> {
    let Some(choice) = choose(input, "(u) upload image  (p) predict  (o) log out  (q) quit").await? else {
        return Ok(false);
    };

    match choice.as_str() {
        "u" => {
            let Some(path) = prompt(input, "Image path: ").await? else {
                return Ok(false);
            };
            match session.upload(PathBuf::from(path)) {
                Ok(()) => render(&session.snapshot()),
                Err(e) => println!("{}", e.user_message()),
            }
        }
        "p" => {
            println!("Classifying...");
            match session.predict().await {
                Ok(prediction) => println!(
                    "Prediction: {} ({:.1}%)",
                    prediction.label,
                    prediction.confidence * 100.0
                ),
                Err(e) => println!("{}", e.user_message()),
            }
        }
        "o" => {
            if let Err(e) = session.logout() {
                println!("{}", e.user_message());
            }
            render(&session.snapshot());
        }
        "q" => return Ok(false),
        other => println!("Unknown option: {}", other),
    }
    Ok(true)
}
