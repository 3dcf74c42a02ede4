use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    AbstractText, Candidate, FetchError, PaperSource, clamp_page_size, doi_link,
    decode_json, lookback_start,
};

const FIELDS: &str = "paperId,title,abstract,venue,url,externalIds";

/// Semantic Scholar keyword search. Filters are search terms, joined with spaces.
#[derive(Clone)]
pub struct SemanticScholarSource {
    base_url: String,
    api_key: Option<String>,
    page_size: usize,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    paper_id: String,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    venue: Option<String>,
    url: Option<String>,
    external_ids: Option<ExternalIds>,
}

#[derive(Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

impl SemanticScholarSource {
    pub fn new(client: reqwest::Client, page_size: usize) -> Self {
        Self {
            base_url: "https://api.semanticscholar.org".to_string(),
            api_key: None,
            // the search endpoint refuses limits above 100
            page_size: clamp_page_size(page_size).min(100),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }
}

impl From<Paper> for Candidate {
    fn from(paper: Paper) -> Self {
        let link = paper
            .external_ids
            .and_then(|ids| ids.doi)
            .as_deref()
            .and_then(doi_link)
            .or(paper.url);

        Candidate {
            id: paper.paper_id,
            title: paper
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            abstract_text: paper.abstract_text.map(AbstractText::Plain),
            venue: paper.venue.filter(|v| !v.trim().is_empty()),
            link,
        }
    }
}

#[async_trait]
impl PaperSource for SemanticScholarSource {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    async fn fetch(
        &self,
        filters: &[String],
        lookback_days: u32,
    ) -> Result<Vec<Candidate>, FetchError> {
        let url = format!("{}/graph/v1/paper/search", self.base_url);
        let terms = filters
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let since = format!("{}:", lookback_start(lookback_days).format("%Y-%m-%d"));
        let limit = self.page_size.to_string();

        tracing::debug!(source = "semantic_scholar", query = %terms, "searching papers");

        let mut request = self.client.get(&url).query(&[
            ("query", terms.as_str()),
            ("limit", limit.as_str()),
            ("fields", FIELDS),
            ("publicationDateOrYear", since.as_str()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let search: SearchResponse = decode_json(response).await?;

        let mut candidates: Vec<Candidate> = search.data.into_iter().map(Candidate::from).collect();
        candidates.truncate(self.page_size);
        Ok(candidates)
    }
}
