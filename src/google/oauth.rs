//! Google OAuth token exchange plus storage of refresh tokens
use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use tokio_rusqlite::Connection;

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub const SCOPES: &str = "https://www.googleapis.com/auth/gmail.modify https://www.googleapis.com/auth/calendar.events";

#[derive(Debug, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

async fn request_token(token_url: &str, params: &[(&str, &str)]) -> Result<OAuthToken> {
    let res = Client::new().post(token_url).form(params).send().await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Token request failed: {} ({})", status, text);
    }
    let token: OAuthToken = serde_json::from_str(&text)?;
    Ok(token)
}

/// Exchange an authorization code from the consent screen for tokens
pub async fn exchange_code_for_token(
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<OAuthToken> {
    request_token(
        TOKEN_URL,
        &[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ],
    )
    .await
}

/// Get a fresh access token using a stored refresh token
pub async fn refresh_access_token(
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<OAuthToken> {
    refresh_access_token_at(TOKEN_URL, client_id, client_secret, refresh_token).await
}

pub async fn refresh_access_token_at(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<OAuthToken> {
    request_token(
        token_url,
        &[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ],
    )
    .await
}

pub async fn save_refresh_token(
    db: &Connection,
    email: &str,
    service: &str,
    refresh_token: &str,
) -> Result<()> {
    let email = email.to_string();
    let service = service.to_string();
    let refresh_token = refresh_token.to_string();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO auth (id, service, refresh_token) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET service = excluded.service, refresh_token = excluded.refresh_token",
            (&email, &service, &refresh_token),
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

pub async fn find_all_gmail_auth_emails(db: &Connection) -> Result<Vec<String>> {
    let emails = db
        .call(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM auth WHERE service = 'gmail' ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
        .await?;
    Ok(emails)
}

pub async fn find_refresh_token(db: &Connection, email: &str) -> Result<String> {
    let id = email.to_string();
    let token: Option<String> = db
        .call(move |conn| {
            let mut stmt = conn.prepare("SELECT refresh_token FROM auth WHERE id = ?1")?;
            let mut rows = stmt.query_map([&id], |row| row.get(0))?;
            Ok(rows.next().transpose()?)
        })
        .await?;
    token.ok_or(anyhow!("No refresh token stored for {}", email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::{async_db, initialize_db};

    async fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let db = async_db(dir.path().to_str().unwrap()).await.unwrap();
        db.call(|conn| {
            initialize_db(conn)?;
            Ok(())
        })
        .await
        .unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_save_and_find_refresh_token() {
        let (_dir, db) = test_db().await;

        save_refresh_token(&db, "me@example.com", "gmail", "first")
            .await
            .unwrap();
        save_refresh_token(&db, "me@example.com", "gmail", "second")
            .await
            .unwrap();

        assert_eq!(
            find_refresh_token(&db, "me@example.com").await.unwrap(),
            "second"
        );
        assert_eq!(
            find_all_gmail_auth_emails(&db).await.unwrap(),
            vec!["me@example.com".to_string()]
        );
        assert!(find_refresh_token(&db, "other@example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_access_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::UrlEncoded(
                "grant_type".to_string(),
                "refresh_token".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "ya29.token", "expires_in": 3599, "token_type": "Bearer"}"#)
            .create_async()
            .await;

        let token = refresh_access_token_at(
            &format!("{}/token", server.url()),
            "client",
            "secret",
            "refresh",
        )
        .await
        .unwrap();
        assert_eq!(token.access_token, "ya29.token");
        assert_eq!(token.refresh_token, None);
    }

    #[tokio::test]
    async fn test_refresh_access_token_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create_async()
            .await;

        let result =
            refresh_access_token_at(&format!("{}/token", server.url()), "c", "s", "r").await;
        assert!(result.is_err());
    }
}
