use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reconstruct::{NO_ABSTRACT, reconstruct_abstract};

/// Abstract as delivered by a source: either prose or a word -> positions index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AbstractText {
    Plain(String),
    InvertedIndex(BTreeMap<String, Vec<usize>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub abstract_text: Option<AbstractText>,
    pub venue: Option<String>,
    pub link: Option<String>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: None,
            venue: None,
            link: None,
        }
    }

    pub fn with_abstract(mut self, abstract_text: AbstractText) -> Self {
        self.abstract_text = Some(abstract_text);
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    /// Abstract as plain text, falling back to a fixed placeholder.
    pub fn abstract_plain(&self) -> String {
        match &self.abstract_text {
            Some(AbstractText::Plain(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Some(AbstractText::Plain(_)) | None => NO_ABSTRACT.to_string(),
            Some(AbstractText::InvertedIndex(index)) => reconstruct_abstract(Some(index)),
        }
    }
}
