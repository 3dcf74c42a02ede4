pub mod candidate;
pub mod openalex;
pub mod reconstruct;
pub mod semantic_scholar;

pub use candidate::{AbstractText, Candidate};
pub use openalex::OpenAlexSource;
pub use reconstruct::{NO_ABSTRACT, reconstruct_abstract};
pub use semantic_scholar::SemanticScholarSource;
pub use reqwest::StatusCode;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};

/// Hard ceiling on results requested from any source in one call.
pub const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http {
        status: StatusCode,
        body: String,
    },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A search backend that yields candidate papers for a session.
///
/// `filters` are passed through verbatim; each source decides how to join them.
/// Implementations report failures as `FetchError`, the caller decides whether
/// a failed fetch is fatal.
#[async_trait]
pub trait PaperSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        filters: &[String],
        lookback_days: u32,
    ) -> Result<Vec<Candidate>, FetchError>;
}

/// Earliest publication date included for a lookback window ending today.
pub fn lookback_start(lookback_days: u32) -> NaiveDate {
    lookback_start_from(Utc::now().date_naive(), lookback_days)
}

pub fn lookback_start_from(today: NaiveDate, lookback_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN)
}

pub(crate) fn clamp_page_size(page_size: usize) -> usize {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

/// Turn a bare DOI into a resolvable link; full URLs are kept as-is.
pub(crate) fn doi_link(doi: &str) -> Option<String> {
    let doi = doi.trim();
    if doi.is_empty() {
        return None;
    }
    if doi.starts_with("http://") || doi.starts_with("https://") {
        Some(doi.to_string())
    } else {
        Some(format!("https://doi.org/{}", doi))
    }
}

pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Http {
        status,
        body: truncate_preview(&body, 500),
    })
}

/// Read a successful response and decode its JSON body.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, FetchError> {
    let body = error_for_status(response).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

fn truncate_preview(input: &str, max: usize) -> String {
    if input.len() <= max {
        return input.to_string();
    }
    let mut end = max;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &input[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookback_start_subtracts_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(
            lookback_start_from(today, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(lookback_start_from(today, 0), today);
    }

    #[test]
    fn page_size_is_bounded() {
        assert_eq!(clamp_page_size(0), 1);
        assert_eq!(clamp_page_size(50), 50);
        assert_eq!(clamp_page_size(10_000), MAX_PAGE_SIZE);
    }

    #[test]
    fn doi_link_normalizes_bare_dois() {
        assert_eq!(
            doi_link("10.1000/xyz").as_deref(),
            Some("https://doi.org/10.1000/xyz")
        );
        assert_eq!(
            doi_link("https://doi.org/10.1000/xyz").as_deref(),
            Some("https://doi.org/10.1000/xyz")
        );
        assert_eq!(doi_link("  "), None);
    }
}
