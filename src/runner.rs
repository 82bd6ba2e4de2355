use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Config;
use crate::cor_sink::CoralogixSink;
use crate::sf_auth::{self, AuthError};
use crate::sf_logs::{SfLogClient, SourceError};
use crate::state::{self, WatermarkState};
use crate::transform;
use crate::types::LogFileDescriptor;

/// Fatal run outcomes. Per-file fetch, transform, and delivery failures are
/// not here: those are logged, counted, and never abort the run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration: {0}")]
    Config(String),

    #[error("watermark store: {0}")]
    Store(String),

    #[error("authentication: {0}")]
    Auth(#[from] AuthError),

    #[error("listing: {0}")]
    Listing(#[from] SourceError),
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub files_listed: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub records_sent: usize,
    pub watermark: String,
}

enum FileOutcome {
    Delivered(usize),
    Empty,
    Failed,
}

/// Execute one pipeline run: read watermark, authenticate, list files since
/// the watermark, process each file independently, then advance the
/// watermark to the run start instant. The watermark is written only after
/// the listing succeeded and every per-file operation has resolved; a run
/// that fails earlier leaves it untouched.
pub async fn run_once(cfg: &Config) -> Result<RunSummary, RunError> {
    let run_started = Utc::now();

    let mut state = WatermarkState::load(&cfg.watermark_path)
        .map_err(|err| RunError::Store(format!("{err:#}")))?;
    let watermark = state
        .last_run
        .clone()
        .filter(|w| state::parse_watermark(w).is_some())
        .unwrap_or_else(|| state::format_watermark(run_started));

    let source = SfLogClient::new(cfg)
        .map_err(|err| RunError::Config(format!("building source client: {err}")))?;
    let sink = CoralogixSink::new(cfg)
        .map_err(|err| RunError::Config(format!("building sink client: {err}")))?;

    let token = sf_auth::get_access_token(cfg).await?;

    let files = source.list_files_since(&token, &watermark).await?;
    let files_listed = files.len();
    info!(watermark = %watermark, files = files_listed, "event log files listed");

    let mut files_processed = 0usize;
    let mut files_failed = 0usize;
    let mut records_sent = 0usize;

    if files_listed > 0 {
        let sem = Arc::new(Semaphore::new(cfg.max_in_flight.max(1)));
        let source_ref = &source;
        let sink_ref = &sink;
        let token_ref = token.as_str();
        let mut tasks: FuturesUnordered<_> = files
            .into_iter()
            .map(|descriptor| {
                let sem = sem.clone();
                async move {
                    let _permit = sem.acquire_owned().await.unwrap();
                    process_file(source_ref, sink_ref, token_ref, descriptor).await
                }
            })
            .collect();

        while let Some(outcome) = tasks.next().await {
            match outcome {
                FileOutcome::Delivered(n) => {
                    files_processed += 1;
                    records_sent += n;
                }
                FileOutcome::Empty => files_processed += 1,
                FileOutcome::Failed => files_failed += 1,
            }
        }
    }

    let next_watermark = advance_watermark(&state, run_started);
    state.last_run = Some(next_watermark.clone());
    state
        .save(&cfg.watermark_path)
        .map_err(|err| RunError::Store(format!("{err:#}")))?;

    let summary = RunSummary {
        files_listed,
        files_processed,
        files_failed,
        records_sent,
        watermark: next_watermark,
    };
    info!(
        files = summary.files_listed,
        processed = summary.files_processed,
        failed = summary.files_failed,
        records = summary.records_sent,
        watermark = %summary.watermark,
        "run complete"
    );
    Ok(summary)
}

async fn process_file(
    source: &SfLogClient,
    sink: &CoralogixSink,
    token: &str,
    descriptor: LogFileDescriptor,
) -> FileOutcome {
    let raw = match source.fetch_file(token, &descriptor).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(
                id = %descriptor.id,
                event_type = %descriptor.event_type,
                "fetch failed, skipping file: {err}"
            );
            return FileOutcome::Failed;
        }
    };

    let batch = transform::transform(&descriptor.event_type, &raw);
    if batch.is_empty() {
        info!(id = %descriptor.id, event_type = %descriptor.event_type, "no data rows");
        return FileOutcome::Empty;
    }

    match sink.deliver(&batch).await {
        Ok(()) => {
            info!(
                id = %descriptor.id,
                event_type = %descriptor.event_type,
                records = batch.len(),
                "file delivered"
            );
            FileOutcome::Delivered(batch.len())
        }
        Err(err) => {
            warn!(
                id = %descriptor.id,
                event_type = %descriptor.event_type,
                "delivery failed, dropping batch: {err}"
            );
            FileOutcome::Failed
        }
    }
}

/// The new watermark is the run start instant, clamped so the cursor never
/// moves backwards if the stored value is somehow ahead of this run.
fn advance_watermark(state: &WatermarkState, run_started: DateTime<Utc>) -> String {
    let candidate = state::format_watermark(run_started);
    match state.last_run.as_deref() {
        Some(prev) if state::parse_watermark(prev).is_some() && prev > candidate.as_str() => {
            warn!(stored = %prev, candidate = %candidate, "stored watermark ahead of run start, keeping it");
            prev.to_string()
        }
        _ => candidate,
    }
}
