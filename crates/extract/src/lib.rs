pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod retry;
pub mod schema;

pub use llm::{GeminiClient, LlmBackend, LlmError, LlmErrorKind};
pub use normalizer::{parse_classification, strip_code_fences};
pub use retry::{Backoff, RetryError, RetryPolicy};
pub use schema::{ClassificationResult, ScoringMode, TierAnalysis};

use ingest::Candidate;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("still rate limited after {attempts} attempts: {source}")]
    RetriesExhausted { attempts: u32, source: LlmError },

    #[error("classifier backend failed: {0}")]
    Backend(LlmError),

    #[error("unparseable classifier response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<RetryError<LlmError>> for ClassifyError {
    fn from(err: RetryError<LlmError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => ClassifyError::RetriesExhausted {
                attempts,
                source: last,
            },
            RetryError::Permanent(e) => ClassifyError::Backend(e),
        }
    }
}

/// Scores candidates against a rubric through an LLM backend.
#[derive(Clone)]
pub struct Classifier {
    backend: Arc<dyn LlmBackend>,
    retry: RetryPolicy,
}

impl Classifier {
    pub fn new(backend: Arc<dyn LlmBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Classify one candidate, reporting why it failed if it did.
    pub async fn try_classify(
        &self,
        candidate: &Candidate,
        rubric: &str,
        mode: ScoringMode,
    ) -> Result<ClassificationResult, ClassifyError> {
        let prompt = prompt::build_classification_prompt(
            mode,
            rubric,
            &candidate.title,
            &candidate.abstract_plain(),
        );

        let raw = self
            .retry
            .retry("classify", || self.backend.generate(&prompt))
            .await?;

        Ok(parse_classification(&raw)?)
    }

    /// Classify one candidate; any failure yields the zero-score fallback.
    pub async fn classify(
        &self,
        candidate: &Candidate,
        rubric: &str,
        mode: ScoringMode,
    ) -> ClassificationResult {
        match self.try_classify(candidate, rubric, mode).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(candidate = %candidate.id, error = %e, "classification failed, using fallback");
                ClassificationResult::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays canned responses; repeats the last one once the script runs out.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        last: Mutex<Option<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = next {
                *last = Some(next);
            }
            last.clone().expect("script must not be empty")
        }
    }

    fn paper() -> Candidate {
        Candidate::new("W1", "Silica in droplets")
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_backend_is_tried_exactly_three_times() {
        let backend = ScriptedBackend::new(vec![Err(LlmError::rate_limited("429"))]);
        let classifier = Classifier::new(backend.clone(), RetryPolicy::new(3, Backoff::Fixed(10)));

        let result = classifier.classify(&paper(), "rubric", ScoringMode::Score).await;

        assert_eq!(backend.calls(), 3);
        assert_eq!(result, ClassificationResult::fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_tried_once() {
        let backend = ScriptedBackend::new(vec![Err(LlmError::new(LlmErrorKind::Http, "500"))]);
        let classifier = Classifier::new(backend.clone(), RetryPolicy::default());

        let err = classifier
            .try_classify(&paper(), "rubric", ScoringMode::Score)
            .await
            .unwrap_err();

        assert_eq!(backend.calls(), 1);
        assert!(matches!(err, ClassifyError::Backend(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn fenced_response_is_parsed() {
        let backend = ScriptedBackend::new(vec![Ok(
            "```json\n{\"score\": 8, \"novelty\": \"Flow reactor\"}\n```".to_string(),
        )]);
        let classifier = Classifier::new(backend.clone(), RetryPolicy::default());

        let result = classifier.classify(&paper(), "rubric", ScoringMode::Score).await;

        assert_eq!(result.score, 8);
        assert_eq!(result.summary, "Flow reactor");
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_is_not_retried() {
        let backend = ScriptedBackend::new(vec![Ok("not json".to_string())]);
        let classifier = Classifier::new(backend.clone(), RetryPolicy::default());

        let err = classifier
            .try_classify(&paper(), "rubric", ScoringMode::Score)
            .await
            .unwrap_err();

        assert_eq!(backend.calls(), 1);
        assert!(matches!(err, ClassifyError::Parse(_)));
        assert_eq!(
            classifier.classify(&paper(), "rubric", ScoringMode::Score).await,
            ClassificationResult::fallback()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_quota_frees_up() {
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::rate_limited("quota")),
            Ok(r#"{"excluded": false, "tier": 1, "analysis": {"innovation": "x"}}"#.to_string()),
        ]);
        let classifier = Classifier::new(backend.clone(), RetryPolicy::new(3, Backoff::Linear(15)));

        let result = classifier.classify(&paper(), "rubric", ScoringMode::Tiered).await;

        assert_eq!(backend.calls(), 2);
        assert_eq!(result.excluded, Some(false));
        assert_eq!(result.tier, Some(1));
    }
}
