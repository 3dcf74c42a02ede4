use extract::{ClassificationResult, Classifier, ScoringMode};
use ingest::{Candidate, PaperSource};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use store::SeenStore;
use tracing::{debug, info, warn};

use crate::metrics::RunMetrics;
use crate::report::{ReportEntry, ReportFragment};
use crate::session::Session;
use crate::PipelineError;

/// Run-wide knobs shared by every session.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub lookback_days: u32,
    pub min_relevance_score: u8,
    /// Pause after every classifier call, successful or not.
    pub call_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            lookback_days: 2,
            min_relevance_score: 7,
            call_delay: Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Fetching,
    Filtering,
    Classifying,
    Accumulating,
    Done,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Fetching => "FETCHING",
            SessionState::Filtering => "FILTERING",
            SessionState::Classifying => "CLASSIFYING",
            SessionState::Accumulating => "ACCUMULATING",
            SessionState::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Whether a classification earns a place in the digest.
pub fn is_accepted(result: &ClassificationResult, mode: ScoringMode, min_score: u8) -> bool {
    match mode {
        ScoringMode::Score => result.score >= min_score,
        // tier is for display only; a missing verdict counts as excluded
        ScoringMode::Tiered => result.excluded == Some(false),
    }
}

/// Paper sources addressable by the name sessions refer to.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn PaperSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Arc<dyn PaperSource>) {
        self.sources.insert(source.name().to_string(), source);
    }

    pub fn with(mut self, source: Arc<dyn PaperSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PaperSource>> {
        self.sources.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }
}

/// Sequential fetch -> dedupe -> classify -> threshold flow over sessions.
pub struct SessionPipeline<'a> {
    settings: &'a PipelineSettings,
    sources: &'a SourceRegistry,
    classifier: &'a Classifier,
    seen: &'a dyn SeenStore,
    metrics: &'a RunMetrics,
}

impl<'a> SessionPipeline<'a> {
    pub fn new(
        settings: &'a PipelineSettings,
        sources: &'a SourceRegistry,
        classifier: &'a Classifier,
        seen: &'a dyn SeenStore,
        metrics: &'a RunMetrics,
    ) -> Self {
        Self {
            settings,
            sources,
            classifier,
            seen,
            metrics,
        }
    }

    /// Run every session in declaration order and keep the fragments with news.
    pub async fn run(&self, sessions: &[Session]) -> Result<Vec<ReportFragment>, PipelineError> {
        let mut fragments = Vec::new();
        for session in sessions {
            let fragment = self.run_session(session).await?;
            if fragment.is_empty() {
                info!(session = %session.id, "no new relevant papers");
            } else {
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }

    pub async fn run_session(&self, session: &Session) -> Result<ReportFragment, PipelineError> {
        let mut fragment = ReportFragment::new(&session.id, &session.title);
        info!(session = %session.id, title = %session.title, "checking session");

        self.enter(session, SessionState::Fetching);
        let candidates = self.fetch(session).await?;
        if candidates.is_empty() {
            self.finish(session, &fragment);
            return Ok(fragment);
        }

        self.enter(session, SessionState::Filtering);
        let mut fresh = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.seen.is_new(&candidate.id)? {
                fresh.push(candidate);
            } else {
                self.metrics.record_already_seen();
                debug!(session = %session.id, candidate = %candidate.id, "already seen");
            }
        }

        self.enter(session, SessionState::Classifying);
        let total = fresh.len();
        for (i, candidate) in fresh.iter().enumerate() {
            debug!(
                session = %session.id,
                candidate = %candidate.id,
                index = i + 1,
                total,
                "classifying"
            );
            if let Some(entry) = self.classify(session, candidate).await {
                fragment.push(entry);
            }
            tokio::time::sleep(self.settings.call_delay).await;
        }

        self.enter(session, SessionState::Accumulating);
        self.finish(session, &fragment);
        Ok(fragment)
    }

    async fn fetch(&self, session: &Session) -> Result<Vec<Candidate>, PipelineError> {
        let source = self
            .sources
            .get(&session.source)
            .ok_or_else(|| PipelineError::UnknownSource(session.source.clone()))?;

        match source.fetch(&session.filters, self.settings.lookback_days).await {
            Ok(candidates) => {
                self.metrics.record_fetch(candidates.len());
                debug!(session = %session.id, fetched = candidates.len(), "fetched candidates");
                Ok(candidates)
            }
            Err(e) => {
                // a broken source only costs this session
                self.metrics.record_fetch_failure();
                warn!(session = %session.id, source = %session.source, error = %e, "fetch failed, skipping session");
                Ok(Vec::new())
            }
        }
    }

    async fn classify(&self, session: &Session, candidate: &Candidate) -> Option<ReportEntry> {
        let (result, fell_back) = match self
            .classifier
            .try_classify(candidate, &session.rubric, session.scoring)
            .await
        {
            Ok(result) => (result, false),
            Err(e) => {
                warn!(
                    session = %session.id,
                    candidate = %candidate.id,
                    error = %e,
                    "classification failed, scoring as 0"
                );
                (ClassificationResult::fallback(), true)
            }
        };

        let accepted = is_accepted(&result, session.scoring, self.settings.min_relevance_score);
        self.metrics.record_classification(fell_back, accepted);

        if accepted {
            info!(
                session = %session.id,
                candidate = %candidate.id,
                score = result.score,
                tier = ?result.tier,
                "captured"
            );
            Some(ReportEntry::new(candidate, result, session.scoring))
        } else {
            debug!(session = %session.id, candidate = %candidate.id, score = result.score, "rejected");
            None
        }
    }

    fn enter(&self, session: &Session, state: SessionState) {
        debug!(session = %session.id, state = %state, "session state");
    }

    fn finish(&self, session: &Session, fragment: &ReportFragment) {
        self.metrics.record_session(!fragment.is_empty());
        self.enter(session, SessionState::Done);
    }
}
