use chrono::NaiveDate;
use extract::{ClassificationResult, ScoringMode, TierAnalysis};
use ingest::Candidate;
use serde::Serialize;
use std::fmt::Write;

pub const REPORT_HEADER: &str = "<h1>🔬 Daily Scientific Digest</h1>";
pub const MISSING_LINK: &str = "#";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub score: u8,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub venue: Option<String>,
    pub tier: Option<u8>,
    pub analysis: Option<TierAnalysis>,
}

impl ReportEntry {
    /// Tier data is only kept for tiered sessions; a numeric entry always
    /// renders as `[score/10]`.
    pub fn new(candidate: &Candidate, result: ClassificationResult, mode: ScoringMode) -> Self {
        let (tier, analysis) = match mode {
            ScoringMode::Score => (None, None),
            ScoringMode::Tiered => (result.tier, result.analysis),
        };
        Self {
            score: result.score,
            title: candidate.title.clone(),
            link: candidate
                .link
                .clone()
                .unwrap_or_else(|| MISSING_LINK.to_string()),
            summary: result.summary,
            venue: candidate.venue.clone(),
            tier,
            analysis,
        }
    }
}

/// Accepted entries for one session, in the order they were accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportFragment {
    pub session_id: String,
    pub title: String,
    pub entries: Vec<ReportEntry>,
}

impl ReportFragment {
    pub fn new(session_id: &str, title: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            title: title.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub fn report_subject(date: NaiveDate) -> String {
    format!("🔬 Scientific Update: {}", date.format("%Y-%m-%d"))
}

/// Render fragments as one HTML digest, in the order given.
///
/// Empty fragments are skipped; `None` means there is nothing to send.
pub fn assemble(fragments: &[ReportFragment]) -> Option<String> {
    let mut html = String::from(REPORT_HEADER);
    let mut sections = 0;

    for fragment in fragments.iter().filter(|f| !f.is_empty()) {
        sections += 1;
        let _ = write!(html, "<h2>{}</h2><ul>", escape_html(&fragment.title));
        for entry in &fragment.entries {
            render_entry(&mut html, entry);
        }
        html.push_str("</ul>");
    }

    (sections > 0).then_some(html)
}

fn render_entry(html: &mut String, entry: &ReportEntry) {
    let label = match entry.tier {
        Some(tier) => format!("Tier {}", tier),
        None => format!("{}/10", entry.score),
    };
    let _ = write!(
        html,
        "<li><b>[{}] <a href='{}'>{}</a></b>",
        label,
        escape_html(&entry.link),
        escape_html(&entry.title)
    );
    if let Some(venue) = &entry.venue {
        let _ = write!(html, " <small>({})</small>", escape_html(venue));
    }

    let details = tier_details(entry);
    if details.is_empty() {
        if !entry.summary.trim().is_empty() {
            let _ = write!(html, "<br><i>{}</i>", escape_html(entry.summary.trim()));
        }
    } else {
        for (name, value) in details {
            let _ = write!(html, "<br><b>{}:</b> {}", name, escape_html(value));
        }
    }
    html.push_str("</li>");
}

/// Fields shown for a tiered entry, depending on its tier.
fn tier_details(entry: &ReportEntry) -> Vec<(&'static str, &str)> {
    let Some(analysis) = &entry.analysis else {
        return Vec::new();
    };
    let fields: Vec<(&'static str, &Option<String>)> = match entry.tier {
        Some(1) => vec![
            ("Innovation", &analysis.innovation),
            ("Process", &analysis.process),
            ("Insight", &analysis.insight),
        ],
        Some(2) => vec![("Tech", &analysis.tech), ("Relevance", &analysis.relevance)],
        Some(_) => vec![("Gist", &analysis.gist)],
        None => return Vec::new(),
    };
    fields
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        })
        .collect()
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
