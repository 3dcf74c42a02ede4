use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Counters for one digest run.
pub struct RunMetrics {
    started: Instant,

    sessions_run: AtomicUsize,
    sessions_with_news: AtomicUsize,
    fetch_failures: AtomicUsize,

    candidates_fetched: AtomicUsize,
    already_seen: AtomicUsize,
    classified: AtomicUsize,
    classification_fallbacks: AtomicUsize,
    accepted: AtomicUsize,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            sessions_run: AtomicUsize::new(0),
            sessions_with_news: AtomicUsize::new(0),
            fetch_failures: AtomicUsize::new(0),
            candidates_fetched: AtomicUsize::new(0),
            already_seen: AtomicUsize::new(0),
            classified: AtomicUsize::new(0),
            classification_fallbacks: AtomicUsize::new(0),
            accepted: AtomicUsize::new(0),
        }
    }

    pub fn record_session(&self, had_news: bool) {
        self.sessions_run.fetch_add(1, Ordering::Relaxed);
        if had_news {
            self.sessions_with_news.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_fetch(&self, candidates: usize) {
        self.candidates_fetched.fetch_add(candidates, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_already_seen(&self) {
        self.already_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classification(&self, fell_back: bool, accepted: bool) {
        self.classified.fetch_add(1, Ordering::Relaxed);
        if fell_back {
            self.classification_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        if accepted {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_run: self.sessions_run.load(Ordering::Relaxed),
            sessions_with_news: self.sessions_with_news.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            candidates_fetched: self.candidates_fetched.load(Ordering::Relaxed),
            already_seen: self.already_seen.load(Ordering::Relaxed),
            classified: self.classified.load(Ordering::Relaxed),
            classification_fallbacks: self.classification_fallbacks.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub sessions_run: usize,
    pub sessions_with_news: usize,
    pub fetch_failures: usize,
    pub candidates_fetched: usize,
    pub already_seen: usize,
    pub classified: usize,
    pub classification_fallbacks: usize,
    pub accepted: usize,
    pub elapsed_secs: f64,
}
