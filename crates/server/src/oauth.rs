//! Authorization-code exchange with the Google and Facebook OAuth APIs.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::{FacebookOAuthConfig, GoogleOAuthConfig};

#[derive(Debug, Deserialize)]
pub struct GoogleTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FacebookTokens {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

/// Provider-side identity of the signed-in user.
#[derive(Debug, Deserialize)]
pub struct ProviderUserInfo {
    pub id: String,
    pub email: String,
}

pub async fn exchange_google_code(
    client: &Client,
    config: &GoogleOAuthConfig,
    code: &str,
) -> Result<GoogleTokens> {
    let response = client
        .post("https://oauth2.googleapis.com/token")
        .json(&json!({
            "code": code,
            "client_id": config.client_id,
            "client_secret": config.client_secret,
            "redirect_uri": config.redirect_uri,
            "grant_type": "authorization_code",
        }))
        .send()
        .await
        .map_err(|e| anyhow!("Failed to reach Google token endpoint: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow!("Google token error ({}): {}", status.as_u16(), text));
    }

    response
        .json()
        .await
        .map_err(|e| anyhow!("Failed to parse Google token response: {}", e))
}

pub async fn fetch_google_userinfo(client: &Client, access_token: &str) -> Result<ProviderUserInfo> {
    let response = client
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to reach Google userinfo endpoint: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow!("Google userinfo error ({}): {}", status.as_u16(), text));
    }

    response
        .json()
        .await
        .map_err(|e| anyhow!("Failed to parse Google userinfo: {}", e))
}

pub async fn exchange_facebook_code(
    client: &Client,
    config: &FacebookOAuthConfig,
    code: &str,
) -> Result<FacebookTokens> {
    let response = client
        .post("https://graph.facebook.com/v20.0/oauth/access_token")
        .form(&[
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| anyhow!("Failed to reach Facebook token endpoint: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow!(
            "Facebook token error ({}): {}",
            status.as_u16(),
            text
        ));
    }

    response
        .json()
        .await
        .map_err(|e| anyhow!("Failed to parse Facebook token response: {}", e))
}

pub async fn fetch_facebook_userinfo(
    client: &Client,
    access_token: &str,
) -> Result<ProviderUserInfo> {
    let response = client
        .get("https://graph.facebook.com/me")
        .query(&[("fields", "id,email"), ("access_token", access_token)])
        .send()
        .await
        .map_err(|e| anyhow!("Failed to reach Facebook userinfo endpoint: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow!(
            "Facebook userinfo error ({}): {}",
            status.as_u16(),
            text
        ));
    }

    response
        .json()
        .await
        .map_err(|e| anyhow!("Failed to parse Facebook userinfo: {}", e))
}
