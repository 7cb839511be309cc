use anyhow::{Result, anyhow};
use std::io::{self, Write};

use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::google::oauth::{SCOPES, exchange_code_for_token, save_refresh_token};

#[derive(clap::ValueEnum, Clone)]
pub enum ServiceKind {
    Gmail,
}

impl ServiceKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            ServiceKind::Gmail => "gmail",
        }
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_owned())
}

pub async fn run(service: ServiceKind) -> Result<()> {
    let config = AppConfig::from_env()?;

    match service {
        ServiceKind::Gmail => {
            let user_email = prompt("Enter the email address you are authenticating: ")?;

            let redirect_uri = std::env::var("RESCAL_GMAIL_REDIRECT_URI")
                .unwrap_or_else(|_| "urn:ietf:wg:oauth:2.0:oob".to_string());
            let auth_url = format!(
                "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
                urlencoding::encode(&config.gmail_api_client_id),
                urlencoding::encode(&redirect_uri),
                urlencoding::encode(SCOPES)
            );
            println!(
                "\nPlease open the following URL in your browser and authorize access:\n\n{}\n",
                auth_url
            );
            let code = prompt("Paste the authorization code shown by Google here: ")?;

            let token = exchange_code_for_token(
                &config.gmail_api_client_id,
                &config.gmail_api_client_secret,
                &code,
                &redirect_uri,
            )
            .await?;

            // Store the refresh token and use that to fetch an access token from now on
            let refresh_token = token
                .refresh_token
                .ok_or(anyhow!("No refresh token in response"))?;
            let db = async_db(&config.db_path).await?;
            save_refresh_token(&db, &user_email, service.to_str(), &refresh_token).await?;
            println!("Refresh token for {} saved to DB.", user_email);
        }
    }

    Ok(())
}
