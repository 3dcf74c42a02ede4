use digest::{PipelineSettings, Session};
use extract::{Backoff, RetryPolicy};
use notify::GmailCredentials;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("session #{0} has an empty id")]
    EmptySessionId(usize),

    #[error("session id '{0}' is declared more than once")]
    DuplicateSession(String),

    #[error("session '{0}' has no filters")]
    NoFilters(String),

    #[error("{field} {reason}")]
    OutOfRange {
        field: &'static str,
        reason: &'static str,
    },
}

/// Everything a run needs, loaded once and passed down by reference.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: u8,
    #[serde(default = "default_call_delay_secs")]
    pub call_delay_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Linear,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: BackoffKind,
    /// Defaults to 10s for fixed and 15s for linear backoff.
    pub base_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    pub openalex_mailto: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    pub recipient: Option<String>,
}

/// Credentials that only ever come from the environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
    pub semantic_scholar_api_key: Option<String>,
    pub gmail: Option<GmailCredentials>,
}

fn default_lookback_days() -> u32 {
    2
}

fn default_min_relevance_score() -> u8 {
    7
}

fn default_call_delay_secs() -> u64 {
    4
}

fn default_page_size() -> usize {
    50
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffKind::default(),
            base_secs: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            system_instruction: None,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let backoff = match self.backoff {
            BackoffKind::Fixed => Backoff::Fixed(self.base_secs.unwrap_or(10)),
            BackoffKind::Linear => Backoff::Linear(self.base_secs.unwrap_or(15)),
        };
        RetryPolicy::new(self.max_attempts, backoff)
    }
}

impl AgentConfig {
    /// Read, apply environment overrides, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&raw)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Environment values win over the file for contact addresses.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(mailto) = non_empty(lookup("OPENALEX_EMAIL")) {
            self.sources.openalex_mailto = Some(mailto);
        }
        if let Some(recipient) = non_empty(lookup("EMAIL_RECIPIENT")) {
            self.notify.recipient = Some(recipient);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_days < 1 {
            return Err(ConfigError::OutOfRange {
                field: "lookback_days",
                reason: "must be at least 1",
            });
        }
        if self.min_relevance_score > 10 {
            return Err(ConfigError::OutOfRange {
                field: "min_relevance_score",
                reason: "must be within 0..=10",
            });
        }
        if self.retry.max_attempts < 1 {
            return Err(ConfigError::OutOfRange {
                field: "retry.max_attempts",
                reason: "must be at least 1",
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::OutOfRange {
                field: "page_size",
                reason: "must be at least 1",
            });
        }

        let mut ids = HashSet::new();
        for (i, session) in self.sessions.iter().enumerate() {
            if session.id.trim().is_empty() {
                return Err(ConfigError::EmptySessionId(i + 1));
            }
            if !ids.insert(session.id.as_str()) {
                return Err(ConfigError::DuplicateSession(session.id.clone()));
            }
            if session.filters.iter().all(|f| f.trim().is_empty()) {
                return Err(ConfigError::NoFilters(session.id.clone()));
            }
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            lookback_days: self.lookback_days,
            min_relevance_score: self.min_relevance_score,
            call_delay: Duration::from_secs(self.call_delay_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let gmail = match (
            non_empty(lookup("GMAIL_CLIENT_ID")),
            non_empty(lookup("GMAIL_CLIENT_SECRET")),
            non_empty(lookup("GMAIL_REFRESH_TOKEN")),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(GmailCredentials {
                client_id,
                client_secret,
                refresh_token,
            }),
            _ => None,
        };

        Self {
            gemini_api_key: non_empty(lookup("GEMINI_API_KEY")),
            semantic_scholar_api_key: non_empty(lookup("SEMANTIC_SCHOLAR_API_KEY")),
            gmail,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
