use extract::ScoringMode;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SOURCE: &str = "openalex";

/// One topical digest section: what to fetch and how to judge it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    /// Passed verbatim to the session's paper source.
    pub filters: Vec<String>,
    pub rubric: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub scoring: ScoringMode,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}
