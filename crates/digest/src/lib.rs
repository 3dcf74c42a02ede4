pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod session;

pub use metrics::{MetricsSnapshot, RunMetrics};
pub use pipeline::{PipelineSettings, SessionPipeline, SessionState, SourceRegistry, is_accepted};
pub use report::{ReportEntry, ReportFragment, assemble, report_subject};
pub use session::Session;

use chrono::NaiveDate;
use notify::{Notifier, NotifyError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no paper source named '{0}'")]
    UnknownSource(String),

    #[error("seen store failed: {0}")]
    Store(#[from] store::StoreError),
}

/// How a run ended. Seen ids are already persisted in every case.
#[derive(Debug)]
pub enum RunOutcome {
    /// No session accepted anything; nothing was sent.
    NoNews,
    Delivered { sessions_with_news: usize },
    DeliveryFailed { error: NotifyError },
}

/// Run all sessions, assemble the digest and hand it to the notifier if non-empty.
pub async fn run_digest(
    pipeline: &SessionPipeline<'_>,
    sessions: &[Session],
    notifier: &dyn Notifier,
    recipient: &str,
    today: NaiveDate,
) -> Result<RunOutcome, PipelineError> {
    let fragments = pipeline.run(sessions).await?;

    let Some(html) = assemble(&fragments) else {
        tracing::info!("no new relevant papers today");
        return Ok(RunOutcome::NoNews);
    };

    tracing::info!(sessions = fragments.len(), "sending digest");
    match notifier.deliver(&report_subject(today), &html, recipient).await {
        Ok(()) => Ok(RunOutcome::Delivered {
            sessions_with_news: fragments.len(),
        }),
        Err(error) => {
            tracing::error!(error = %error, "digest delivery failed");
            Ok(RunOutcome::DeliveryFailed { error })
        }
    }
}
