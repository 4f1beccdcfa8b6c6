//! One-shot reconciliation of recent commits.

use super::{load_config, report_availability, resolve_selection};
use anyhow::{Context, Result};
use medic_core::ResultStore;
use medic_scheduler::{
    EngineSettings, JobQueue, PassSummary, QueueWorker, Reconciler, Registry,
    registry::git_history,
};
use medic_store::{CouchResultStore, MemoryResultStore};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Queue frozen platforms and reconcile the backfill window of every
/// tracked platform once.
///
/// With `dry_run` the queued jobs are printed as JSON rather than built.
/// `no_store` skips the result store so every combination counts as missing.
pub async fn backfill(
    config_path: &Path,
    platforms: Option<&str>,
    dry_run: bool,
    no_store: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let selection = resolve_selection(&config, platforms)?;
    let settings = EngineSettings::from_config(&config, selection);
    report_availability(&settings.availability);

    let registry = Arc::new(Registry::from_config(&config));
    let store: Arc<dyn ResultStore> = if no_store {
        Arc::new(MemoryResultStore::new())
    } else {
        Arc::new(CouchResultStore::new(
            &config.results.url,
            &config.results.database,
        ))
    };
    let history = Arc::new(git_history(&config));

    let (queue, mut receiver) = JobQueue::channel();
    let reconciler = Reconciler::new(settings, registry.clone(), history, store, queue);

    reconciler.queue_frozen();
    let summaries = reconciler.backfill().await;
    print_summaries(&summaries);

    if dry_run {
        let jobs = receiver.drain();
        println!(
            "{}",
            serde_json::to_string_pretty(&jobs).context("Failed to encode jobs")?
        );
        return Ok(());
    }

    // Dropping the reconciler closes the queue so the worker stops once it
    // has drained every job.
    drop(reconciler);
    let succeeded = QueueWorker::new(receiver, registry)
        .run()
        .await;
    info!(succeeded, "Backfill builds finished");
    Ok(())
}

fn print_summaries(summaries: &[PassSummary]) {
    for summary in summaries {
        let outcome = match &summary.skipped {
            Some(reason) => format!("skipped: {:?}", reason),
            None => format!(
                "{} job(s) queued, {} unknown",
                summary.jobs_queued, summary.unknown
            ),
        };
        println!(
            "{:<12} {:>3} commit(s)  {}",
            summary.platform, summary.commits, outcome
        );
    }
}
