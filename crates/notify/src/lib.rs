pub mod file;
pub mod gmail;

pub use file::FileNotifier;
pub use gmail::{GmailCredentials, GmailNotifier};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token refresh rejected (HTTP {status}): {body}")]
    Auth {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("send rejected (HTTP {status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Delivers a finished digest to a person.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, subject: &str, body_html: &str, recipient: &str) -> Result<(), NotifyError>;
}
