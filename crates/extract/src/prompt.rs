use crate::schema::ScoringMode;

pub fn build_classification_prompt(
    mode: ScoringMode,
    rubric: &str,
    title: &str,
    abstract_text: &str,
) -> String {
    match mode {
        ScoringMode::Score => build_score_prompt(rubric, title, abstract_text),
        ScoringMode::Tiered => build_tier_prompt(rubric, title, abstract_text),
    }
}

pub fn build_score_prompt(rubric: &str, title: &str, abstract_text: &str) -> String {
    format!(
        r#"{}

PAPER: {}
ABSTRACT: {}

Score the paper against the rules above.
Output ONLY a JSON object, no markdown, no explanations.

OUTPUT JSON: {{ "score": 0-10, "novelty": "1 sentence summary" }}"#,
        rubric.trim(),
        title,
        abstract_text
    )
}

pub fn build_tier_prompt(rubric: &str, title: &str, abstract_text: &str) -> String {
    format!(
        r#"{}

Analyze the following paper:
Title: {}
Abstract: {}

1. Does this paper fall under the hard exclusions above?
2. If NOT excluded, which Tier does it belong to? (Tier 1, Tier 2, Tier 3)
3. Extract the following based on the Tier:
   - Tier 1: Innovation, The Process, Key Insight.
   - Tier 2: Tech, Relevance (why is it useful for the core topic?).
   - Tier 3: Gist (1 sentence).

Output strictly in JSON format matching this schema:
{{
  "excluded": boolean,
  "tier": 1 | 2 | 3 | null,
  "reason_for_exclusion": "string" | null,
  "analysis": {{
    "innovation": "string" | null,
    "process": "string" | null,
    "insight": "string" | null,
    "tech": "string" | null,
    "relevance": "string" | null,
    "gist": "string" | null
  }}
}}"#,
        rubric.trim(),
        title,
        abstract_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_prompt_carries_rubric_and_paper() {
        let prompt = build_classification_prompt(
            ScoringMode::Score,
            "\n   ROLE: Expert Material Scientist.\n",
            "Gold in flow",
            "We mix fast.",
        );
        assert!(prompt.starts_with("ROLE: Expert Material Scientist."));
        assert!(prompt.contains("PAPER: Gold in flow"));
        assert!(prompt.contains("ABSTRACT: We mix fast."));
        assert!(prompt.contains(r#""score": 0-10"#));
    }

    #[test]
    fn tier_prompt_asks_for_tier_schema() {
        let prompt = build_classification_prompt(ScoringMode::Tiered, "Scout.", "T", "A");
        assert!(prompt.contains("Title: T"));
        assert!(prompt.contains(r#""excluded": boolean"#));
        assert!(!prompt.contains(r#""score""#));
    }
}
