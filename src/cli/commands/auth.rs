use clap::Subcommand;
use serde_json::json;

use crate::auth::AuthClient;
use crate::cli::config::{clear_session, load_session, save_session};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Sign in with email and password")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (read from stdin if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Sign out and forget the local session")]
    Logout,

    #[command(about = "Show current session status")]
    Status,

    #[command(about = "Exchange the refresh token for a new session")]
    Refresh,
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let app = crate::config::config();
    let client = AuthClient::new(&app.remote)?;

    match cmd {
        AuthCommands::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };
            let session = client.sign_in_with_password(&email, &password).await?;
            save_session(&session)?;
            output_success(
                &output_format,
                &format!("Signed in as {}", session.email.as_deref().unwrap_or(&session.user_id)),
                Some(json!({ "user_id": session.user_id, "expires_at": session.expires_at })),
            )
        }
        AuthCommands::Logout => {
            if let Some(session) = load_session()? {
                // Best effort; the local session is dropped either way
                if let Err(e) = client.sign_out(&session).await {
                    tracing::warn!("remote sign-out failed: {}", e);
                }
            }
            clear_session()?;
            output_success(&output_format, "Signed out", None)
        }
        AuthCommands::Status => match load_session()? {
            Some(session) => {
                let skew = chrono::Duration::seconds(app.auth.expiry_skew_secs);
                let expired = session.is_expired(skew, chrono::Utc::now());
                output_success(
                    &output_format,
                    &format!(
                        "{} ({})",
                        session.email.as_deref().unwrap_or(&session.user_id),
                        if expired { "expired" } else { "active" }
                    ),
                    Some(json!({
                        "user_id": session.user_id,
                        "role": session.role,
                        "expires_at": session.expires_at,
                        "expired": expired
                    })),
                )
            }
            None => output_success(&output_format, "Not signed in", Some(json!({ "session": null }))),
        },
        AuthCommands::Refresh => {
            let session = load_session()?.ok_or_else(|| anyhow::anyhow!("Not signed in"))?;
            let refresh_token = session
                .refresh_token
                .ok_or_else(|| anyhow::anyhow!("Session has no refresh token; sign in again"))?;
            let renewed = client.refresh(&refresh_token).await?;
            save_session(&renewed)?;
            output_success(
                &output_format,
                "Session refreshed",
                Some(json!({ "expires_at": renewed.expires_at })),
            )
        }
    }
}
