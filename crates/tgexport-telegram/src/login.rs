//! Interactive sign-in on the terminal, used when the session file is not yet authorized.

use grammers_client::{Client, SignInError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use tgexport_core::{errors::Error, Result};

pub const PHONE_ENV: &str = "TELEGRAM_PHONE";

pub async fn sign_in(client: &Client) -> Result<()> {
    let phone = match std::env::var(PHONE_ENV).ok().filter(|p| !p.trim().is_empty()) {
        Some(p) => p,
        None => prompt("Phone number (international format): ").await?,
    };

    let token = client
        .request_login_code(phone.trim())
        .await
        .map_err(|e| Error::External(format!("failed to request login code: {e}")))?;
    let code = prompt("Login code: ").await?;

    match client.sign_in(&token, code.trim()).await {
        Ok(user) => {
            tracing::info!(user = user.first_name(), "signed in");
            Ok(())
        }
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().unwrap_or("none").to_string();
            let password = prompt(&format!("Two-step password (hint: {hint}): ")).await?;
            let user = client
                .check_password(password_token, password.trim())
                .await
                .map_err(|e| Error::External(format!("password check failed: {e}")))?;
            tracing::info!(user = user.first_name(), "signed in");
            Ok(())
        }
        Err(e) => Err(Error::External(format!("sign in failed: {e}"))),
    }
}

async fn prompt(message: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(message.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    if read == 0 {
        return Err(Error::Config(
            "stdin closed while waiting for login input".to_string(),
        ));
    }
    Ok(line.trim().to_string())
}
