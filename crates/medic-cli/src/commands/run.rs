//! Long-running farm mode.

use super::{load_config, report_availability, resolve_selection};
use anyhow::{Context, Result};
use medic_core::{CommitHistory, ResultStore, Revision};
use medic_feed::connect;
use medic_scheduler::{
    EngineSettings, JobQueue, QueueWorker, Reconciler, Registry, registry::git_history,
};
use medic_store::CouchResultStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

pub async fn run(config_path: &Path, platforms: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let selection = resolve_selection(&config, platforms)?;
    let settings = EngineSettings::from_config(&config, selection);
    report_availability(&settings.availability);

    let registry = Arc::new(Registry::from_config(&config));
    let store = Arc::new(CouchResultStore::new(
        &config.results.url,
        &config.results.database,
    ));
    let history = Arc::new(git_history(&config));

    let succeeded = farm(&config.feed, settings, registry, history, store).await?;
    info!(succeeded, "All queued builds finished");
    Ok(())
}

/// Build the test application, queue frozen platforms, backfill recent
/// commits, then follow the commit feed until it fails.
///
/// With no platform tracked live the feed is never contacted: the frozen
/// jobs are built and the number of successful builds is returned.
pub async fn farm(
    feed: &Url,
    settings: EngineSettings,
    registry: Arc<Registry>,
    history: Arc<dyn CommitHistory>,
    store: Arc<dyn ResultStore>,
) -> Result<usize> {
    info!(output = %registry.app_output().display(), "Building test application");
    registry
        .app_builder()
        .build(registry.app_output(), &Revision::head(), None)
        .await
        .context("Failed to build the test application")?;

    let (queue, receiver) = JobQueue::channel();
    let worker = tokio::spawn(QueueWorker::new(receiver, registry.clone()).run());
    let reconciler = Arc::new(Reconciler::new(settings, registry, history, store, queue));

    let frozen = reconciler.queue_frozen();
    if frozen > 0 {
        info!(frozen, "Queued frozen platforms");
    }

    if reconciler.settings().selection.tracked.is_empty() {
        info!("No platforms tracked live, not following the commit feed");
        // Dropping the only queue handle lets the worker stop once drained.
        drop(reconciler);
        return worker.await.context("Queue worker failed");
    }

    let backfill = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.backfill().await })
    };

    info!(feed = %feed, "Connecting to commit feed");
    let events = match connect(feed).await {
        Ok(events) => events,
        Err(e) => {
            backfill.abort();
            worker.abort();
            return Err(e).context("Failed to connect to the commit feed");
        }
    };

    let result = reconciler.listen(events).await;
    backfill.abort();
    worker.abort();

    if let Err(e) = &result {
        error!(error = %e, "Stopped following the commit feed");
    }
    result.context("Commit feed failed").map(|()| 0)
}
