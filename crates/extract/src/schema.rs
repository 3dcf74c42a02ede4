use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MAX_SCORE: u8 = 10;

/// Which rubric shape a session's classifier answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// `{"score": 0-10, "novelty": "..."}`
    #[default]
    Score,
    /// `{"excluded": bool, "tier": 1|2|3, "analysis": {...}}`
    Tiered,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierAnalysis {
    // Tier 1
    pub innovation: Option<String>,
    pub process: Option<String>,
    pub insight: Option<String>,
    // Tier 2
    pub tech: Option<String>,
    pub relevance: Option<String>,
    // Tier 3
    pub gist: Option<String>,
}

/// Classifier verdict for one candidate.
///
/// Every field tolerates absence, so a partial response still parses. The
/// `Default` value (score 0, not marked as included) doubles as the fallback
/// for failed classifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawClassification")]
pub struct ClassificationResult {
    pub score: u8,
    pub summary: String,
    pub excluded: Option<bool>,
    pub tier: Option<u8>,
    pub reason_for_exclusion: Option<String>,
    pub analysis: Option<TierAnalysis>,
}

impl ClassificationResult {
    /// Zero-score result substituted when classification fails.
    pub fn fallback() -> Self {
        Self::default()
    }
}

/// Wire shape of a reply. `summary` and `novelty` are separate keys so a
/// reply carrying both still parses.
#[derive(Deserialize)]
struct RawClassification {
    #[serde(default, deserialize_with = "score_from_value")]
    score: u8,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    novelty: Option<String>,
    #[serde(default)]
    excluded: Option<bool>,
    #[serde(default, deserialize_with = "tier_from_value")]
    tier: Option<u8>,
    #[serde(default)]
    reason_for_exclusion: Option<String>,
    #[serde(default)]
    analysis: Option<TierAnalysis>,
}

impl From<RawClassification> for ClassificationResult {
    fn from(raw: RawClassification) -> Self {
        let summary = [raw.summary, raw.novelty]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or_default();

        Self {
            score: raw.score,
            summary,
            excluded: raw.excluded,
            tier: raw.tier,
            reason_for_exclusion: raw.reason_for_exclusion,
            analysis: raw.analysis,
        }
    }
}

fn score_from_value<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let raw = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(raw
        .filter(|v| v.is_finite())
        // truncate: 6.5 must not clear a threshold of 7
        .map(|v| v.floor().clamp(0.0, f64::from(MAX_SCORE)) as u8)
        .unwrap_or(0))
}

fn tier_from_value<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let tier = match &value {
        Value::Number(n) => n.as_u64(),
        // tolerate "Tier 2" / "2"
        Value::String(s) => s
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse::<u64>()
            .ok(),
        _ => None,
    };
    Ok(tier.and_then(|t| u8::try_from(t).ok()).filter(|t| (1..=3).contains(t)))
}
