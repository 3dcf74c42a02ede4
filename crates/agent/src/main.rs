mod config;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use digest::{RunMetrics, RunOutcome, SessionPipeline, SourceRegistry, run_digest};
use extract::{Classifier, GeminiClient};
use ingest::{OpenAlexSource, SemanticScholarSource};
use notify::{FileNotifier, GmailNotifier, Notifier};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use store::SqliteSeenStore;
use tracing::Instrument;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use crate::config::{AgentConfig, Secrets};

#[derive(Parser, Debug)]
#[command(name = "paper-digest", version, about = "Daily scientific literature digest")]
struct Cli {
    #[arg(long, default_value = "config/digest.toml")]
    config: PathBuf,
    /// Seen-paper database; created on first run.
    #[arg(long, default_value = "seen_papers.db")]
    db: PathBuf,
    /// Write the digest to --report-dir instead of emailing it.
    #[arg(long)]
    dry_run: bool,
    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    lookback_days: Option<u32>,
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Best-effort .env load; ignore if missing
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let run_id = Uuid::new_v4();
    run(cli).instrument(tracing::info_span!("run", %run_id)).await
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = AgentConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(days) = cli.lookback_days {
        config.lookback_days = days;
    }
    let secrets = Secrets::from_env();
    let today = Utc::now().date_naive();

    tracing::info!(
        sessions = config.sessions.len(),
        lookback_days = config.lookback_days,
        min_score = config.min_relevance_score,
        dry_run = cli.dry_run,
        "starting digest run"
    );

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("building HTTP client")?;

    let sources = SourceRegistry::new()
        .with(Arc::new(
            OpenAlexSource::new(client.clone(), config.page_size)
                .with_mailto(config.sources.openalex_mailto.clone()),
        ))
        .with(Arc::new(
            SemanticScholarSource::new(client.clone(), config.page_size)
                .with_api_key(secrets.semantic_scholar_api_key.clone()),
        ));
    for session in &config.sessions {
        if !sources.contains(&session.source) {
            bail!("session '{}' uses unknown source '{}'", session.id, session.source);
        }
    }

    let api_key = secrets
        .gemini_api_key
        .clone()
        .context("GEMINI_API_KEY is required but not set")?;
    let gemini = GeminiClient::new(client.clone(), api_key, config.llm.model.clone())
        .with_temperature(config.llm.temperature)
        .with_system_instruction(config.llm.system_instruction.clone());
    let classifier = Classifier::new(Arc::new(gemini), config.retry.policy());

    let seen = SqliteSeenStore::open(&cli.db)
        .with_context(|| format!("opening seen store {}", cli.db.display()))?;

    let (notifier, recipient): (Box<dyn Notifier>, String) = if cli.dry_run {
        let notifier = FileNotifier::new(cli.report_dir.clone()).with_date(today);
        tracing::info!(path = %notifier.report_path().display(), "dry run, digest goes to file");
        let recipient = config.notify.recipient.clone().unwrap_or_default();
        (Box::new(notifier), recipient)
    } else {
        let credentials = secrets
            .gmail
            .clone()
            .context("GMAIL_CLIENT_ID, GMAIL_CLIENT_SECRET and GMAIL_REFRESH_TOKEN must all be set")?;
        let recipient = config
            .notify
            .recipient
            .clone()
            .context("no recipient: set notify.recipient or EMAIL_RECIPIENT")?;
        (Box::new(GmailNotifier::new(client.clone(), credentials)), recipient)
    };

    let settings = config.pipeline_settings();
    let metrics = RunMetrics::new();
    let pipeline = SessionPipeline::new(&settings, &sources, &classifier, &seen, &metrics);

    let outcome = run_digest(&pipeline, &config.sessions, notifier.as_ref(), &recipient, today)
        .await
        .context("digest run aborted")?;

    let snapshot = metrics.snapshot();
    tracing::info!(
        metrics = %serde_json::to_string(&snapshot)?,
        "run finished"
    );

    Ok(match outcome {
        RunOutcome::NoNews => {
            tracing::info!("nothing to send");
            ExitCode::SUCCESS
        }
        RunOutcome::Delivered { sessions_with_news } => {
            tracing::info!(sessions_with_news, recipient = %recipient, "digest delivered");
            ExitCode::SUCCESS
        }
        RunOutcome::DeliveryFailed { .. } => ExitCode::FAILURE,
    })
}
