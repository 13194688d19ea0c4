use std::error::Error;

use chrono::Utc;
use clap::Subcommand;
use worklog_core::{BitrixClient, BitrixTokens, Config, TimeSink};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store an OAuth token pair for the portal
    Login {
        /// Access token issued by the portal
        #[arg(long)]
        access_token: String,
        /// Refresh token issued alongside it
        #[arg(long)]
        refresh_token: String,
        /// Seconds until the access token expires
        #[arg(long)]
        expires_in: Option<i64>,
    },
    /// Forget the stored tokens
    Logout,
    /// Show portal and token state
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn Error>> {
    let config = Config::load_or_default();
    let client = BitrixClient::new(&config.crm)?;
    match action {
        AuthAction::Login {
            access_token,
            refresh_token,
            expires_in,
        } => {
            let tokens = BitrixTokens {
                access_token,
                refresh_token,
                expires_at: expires_in.map(|secs| Utc::now().timestamp() + secs),
            };
            client.set_tokens(tokens)?;
            println!("Tokens stored.");
        }
        AuthAction::Logout => {
            client.logout()?;
            println!("Tokens cleared.");
        }
        AuthAction::Status => {
            if config.crm.base_url.is_empty() {
                println!("Portal not configured.");
            } else {
                println!("Portal: {}", config.crm.base_url);
            }
            if client.is_authenticated() {
                println!("Authenticated with {}.", client.name());
            } else {
                println!("Not authenticated.");
            }
        }
    }
    Ok(())
}
