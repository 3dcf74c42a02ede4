use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde::Deserialize;
use serde_json::json;

use crate::{Notifier, NotifyError};

#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Sends mail as the authorized account through the Gmail API, trading a
/// long-lived refresh token for an access token on every delivery.
#[derive(Clone)]
pub struct GmailNotifier {
    token_url: String,
    api_base: String,
    credentials: GmailCredentials,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GmailNotifier {
    pub fn new(client: reqwest::Client, credentials: GmailCredentials) -> Self {
        Self {
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://gmail.googleapis.com".to_string(),
            credentials,
            client,
        }
    }

    /// Point both the token and Gmail endpoints at one server (for tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.token_url = format!("{}/token", base);
        self.api_base = base.to_string();
        self
    }

    async fn access_token(&self) -> Result<String, NotifyError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Auth { status, body });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

const MIME_LINE_LEN: usize = 76;

/// RFC 2822 message with an HTML body, base64url-encoded for `messages.send`.
pub fn encode_message(subject: &str, body_html: &str, recipient: &str) -> String {
    let mime = format!(
        "To: {}\r\nSubject: =?UTF-8?B?{}?=\r\nMIME-Version: 1.0\r\nContent-Type: text/html; charset=\"utf-8\"\r\nContent-Transfer-Encoding: base64\r\n\r\n{}",
        recipient,
        STANDARD.encode(subject),
        wrap_base64(&STANDARD.encode(body_html))
    );
    URL_SAFE.encode(mime)
}

/// Split base64 text into 76-column CRLF lines (RFC 2045).
fn wrap_base64(encoded: &str) -> String {
    encoded
        .as_bytes()
        .chunks(MIME_LINE_LEN)
        .filter_map(|line| std::str::from_utf8(line).ok())
        .collect::<Vec<_>>()
        .join("\r\n")
}

#[async_trait]
impl Notifier for GmailNotifier {
    async fn deliver(&self, subject: &str, body_html: &str, recipient: &str) -> Result<(), NotifyError> {
        let token = self.access_token().await?;
        let url = format!("{}/gmail/v1/users/me/messages/send", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "raw": encode_message(subject, body_html, recipient) }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        tracing::info!(recipient, "digest emailed");
        Ok(())
    }
}
