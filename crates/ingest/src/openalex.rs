use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::{
    AbstractText, Candidate, FetchError, PaperSource, clamp_page_size, doi_link,
    decode_json, lookback_start,
};

const SELECT_FIELDS: &str = "id,title,doi,abstract_inverted_index,primary_location";

/// OpenAlex `/works` search driven by faceted filter expressions
/// (e.g. `concepts.id:C190062978`, `concepts.id:!C177713603`).
#[derive(Clone)]
pub struct OpenAlexSource {
    base_url: String,
    mailto: Option<String>,
    page_size: usize,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Deserialize)]
struct Work {
    id: String,
    title: Option<String>,
    doi: Option<String>,
    abstract_inverted_index: Option<BTreeMap<String, Vec<usize>>>,
    primary_location: Option<Location>,
}

#[derive(Deserialize)]
struct Location {
    source: Option<LocationSource>,
}

#[derive(Deserialize)]
struct LocationSource {
    display_name: Option<String>,
}

impl OpenAlexSource {
    pub fn new(client: reqwest::Client, page_size: usize) -> Self {
        Self {
            base_url: "https://api.openalex.org".to_string(),
            mailto: None,
            page_size: clamp_page_size(page_size),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Contact address for the OpenAlex polite pool.
    pub fn with_mailto(mut self, mailto: Option<String>) -> Self {
        self.mailto = mailto.filter(|m| !m.trim().is_empty());
        self
    }

    fn filter_param(filters: &[String], from: NaiveDate) -> String {
        let mut parts = vec![format!("from_publication_date:{}", from.format("%Y-%m-%d"))];
        parts.extend(
            filters
                .iter()
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(str::to_string),
        );
        parts.join(",")
    }
}

impl From<Work> for Candidate {
    fn from(work: Work) -> Self {
        let venue = work
            .primary_location
            .and_then(|loc| loc.source)
            .and_then(|src| src.display_name);

        Candidate {
            id: work.id,
            title: work
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            abstract_text: work.abstract_inverted_index.map(AbstractText::InvertedIndex),
            venue,
            link: work.doi.as_deref().and_then(doi_link),
        }
    }
}

#[async_trait]
impl PaperSource for OpenAlexSource {
    fn name(&self) -> &str {
        "openalex"
    }

    async fn fetch(
        &self,
        filters: &[String],
        lookback_days: u32,
    ) -> Result<Vec<Candidate>, FetchError> {
        let url = format!("{}/works", self.base_url);
        let filter = Self::filter_param(filters, lookback_start(lookback_days));
        let per_page = self.page_size.to_string();

        let mut query = vec![
            ("filter", filter.as_str()),
            ("per-page", per_page.as_str()),
            ("select", SELECT_FIELDS),
        ];
        if let Some(mailto) = &self.mailto {
            query.push(("mailto", mailto.as_str()));
        }

        tracing::debug!(source = "openalex", filter = %filter, "fetching works");

        let response = self.client.get(&url).query(&query).send().await?;
        let works: WorksResponse = decode_json(response).await?;

        let mut candidates: Vec<Candidate> = works.results.into_iter().map(Candidate::from).collect();
        candidates.truncate(self.page_size);
        Ok(candidates)
    }
}
