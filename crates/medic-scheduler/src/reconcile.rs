//! Build reconciliation: find commits lacking test results and queue them.
//!
//! Three triggers feed the same logic:
//! - live commit notifications check the last `window.live` commits of the project
//! - a startup backfill checks the last `window.backfill` commits of every platform
//! - frozen platforms are queued once at their pinned revision, unchecked
//!
//! Device-granular platforms fan out one result lookup per (commit, device)
//! and decide per commit only once all of that commit's lookups are done.

use crate::queue::JobQueue;
use crate::registry::{PlatformBackend, Registry};
use futures::future::join_all;
use futures::stream::{Stream, StreamExt};
use medic_config::{Availability, MedicConfig, Selection, WindowConfig};
use medic_core::{
    CommitHistory, DeviceMap, Error, Job, Lookup, Platform, Result, ResultKey, ResultStore,
    Revision,
};
use medic_feed::CommitEvent;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Immutable inputs of the reconciler, derived from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub window: WindowConfig,
    pub selection: Selection,
    pub availability: Availability,
    /// Project whose commits rebuild the test application.
    pub commit_hook: Option<String>,
}

impl EngineSettings {
    pub fn from_config(config: &MedicConfig, selection: Selection) -> Self {
        Self {
            window: config.window,
            selection,
            availability: Availability::from_config(config),
            commit_hook: config.app.commit_hook.clone(),
        }
    }
}

/// Why a pass queued nothing without looking at results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Commit history could not be read.
    LookupFailed(String),
    /// The device inventory could not be scanned.
    ScanFailed(String),
    /// No devices are attached, so nothing can be targeted.
    NoDevices,
}

/// Outcome of one reconciliation pass over a commit window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub platform: Platform,
    /// Commits in the window.
    pub commits: usize,
    /// Jobs pushed to the queue.
    pub jobs_queued: usize,
    /// Commits (or commit/device pairs) whose result lookup failed.
    pub unknown: usize,
    pub skipped: Option<SkipReason>,
}

impl PassSummary {
    fn new(platform: &Platform, commits: usize) -> Self {
        Self {
            platform: platform.clone(),
            commits,
            jobs_queued: 0,
            unknown: 0,
            skipped: None,
        }
    }

    fn skipped(platform: &Platform, commits: usize, reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::new(platform, commits)
        }
    }
}

/// Outcome of the lookups for a single commit.
#[derive(Debug, Default)]
struct CommitOutcome {
    queued: bool,
    unknown: usize,
}

/// Stateless coordinator between commit history, device inventories, the
/// result store and the job queue.
pub struct Reconciler {
    settings: EngineSettings,
    registry: Arc<Registry>,
    history: Arc<dyn CommitHistory>,
    store: Arc<dyn ResultStore>,
    queue: JobQueue,
}

impl Reconciler {
    pub fn new(
        settings: EngineSettings,
        registry: Arc<Registry>,
        history: Arc<dyn CommitHistory>,
        store: Arc<dyn ResultStore>,
        queue: JobQueue,
    ) -> Self {
        Self {
            settings,
            registry,
            history,
            store,
            queue,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Queue every frozen platform at its pinned revision. Returns the
    /// number of jobs queued.
    pub fn queue_frozen(&self) -> usize {
        for (platform, revision) in &self.settings.selection.frozen {
            info!(platform = %platform, revision = %revision, "Queueing frozen build");
            self.queue.push(Job::revision(platform.clone(), revision.clone()));
        }
        self.settings.selection.frozen.len()
    }

    /// Check the last `window.backfill` commits of every tracked platform
    /// that is available on this host.
    pub async fn backfill(&self) -> Vec<PassSummary> {
        let count = self.settings.window.backfill;
        let backends: Vec<&PlatformBackend> = self
            .settings
            .selection
            .tracked
            .iter()
            .filter(|p| {
                if let Some(reason) = self.settings.availability.reason(p) {
                    info!(platform = %p, reason = %reason, "Not building platform");
                }
                self.settings.availability.is_available(p)
            })
            .filter_map(|p| {
                let backend = self.registry.get(p);
                if backend.is_none() {
                    warn!(platform = %p, "Tracked platform has no backend");
                }
                backend
            })
            .collect();

        join_all(backends.into_iter().map(|backend| async move {
            info!(platform = %backend.platform, count, "Checking recent commits");
            self.check_recent(backend, count).await
        }))
        .await
    }

    /// React to one upstream push.
    ///
    /// Returns `None` when the event does not concern a live platform.
    pub async fn handle_event(&self, event: &CommitEvent) -> Option<PassSummary> {
        if self.settings.commit_hook.as_deref() == Some(event.project.as_str()) {
            info!(project = %event.project, sha = %event.sha.short(), "Test application changed");
            self.queue.push(Job::test_app(event.sha.clone()));
            return None;
        }

        let backend = self.registry.for_project(&event.project)?;
        // Availability only gates the backfill; a push to a tracked
        // platform is always reconciled.
        if !self.settings.selection.is_tracked(&backend.platform) {
            debug!(project = %event.project, "Ignoring commit for platform not tracked live");
            return None;
        }

        info!(
            platform = %backend.platform,
            sha = %event.sha.short(),
            "New upstream commit"
        );
        // A push can carry several commits, so look back over a window
        // rather than only at the announced sha.
        Some(self.check_recent(backend, self.settings.window.live).await)
    }

    /// Consume a commit event stream until it ends.
    ///
    /// Each event is reconciled on its own task so a slow pass never stalls
    /// the stream. A stream error is returned to the caller.
    pub async fn listen<S>(self: Arc<Self>, mut events: S) -> Result<()>
    where
        S: Stream<Item = Result<CommitEvent>> + Unpin,
    {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    let reconciler = self.clone();
                    tokio::spawn(async move {
                        reconciler.handle_event(&event).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Commit stream failed");
                    return Err(e);
                }
            }
        }
        Err(Error::Stream("commit stream closed".to_string()))
    }

    async fn check_recent(&self, backend: &PlatformBackend, count: usize) -> PassSummary {
        match self.history.recent(&backend.project, count).await {
            Ok(commits) => self.reconcile(backend, &commits).await,
            Err(e) => {
                warn!(platform = %backend.platform, error = %e, "Could not read commit history");
                PassSummary::skipped(&backend.platform, 0, SkipReason::LookupFailed(e.to_string()))
            }
        }
    }

    /// Run one reconciliation pass over `commits` for a platform.
    pub async fn reconcile(&self, backend: &PlatformBackend, commits: &[Revision]) -> PassSummary {
        match &backend.scanner {
            None => self.reconcile_commits(&backend.platform, commits).await,
            Some(scanner) => match scanner.scan().await {
                Ok(devices) if devices.is_empty() => {
                    info!(platform = %backend.platform, "No devices attached, skipping");
                    PassSummary::skipped(&backend.platform, commits.len(), SkipReason::NoDevices)
                }
                Ok(devices) => {
                    self.reconcile_devices(&backend.platform, commits, &devices)
                        .await
                }
                Err(e) => {
                    warn!(platform = %backend.platform, error = %e, "Device scan failed");
                    PassSummary::skipped(
                        &backend.platform,
                        commits.len(),
                        SkipReason::ScanFailed(e.to_string()),
                    )
                }
            },
        }
    }

    /// Platforms without a device axis: one job per untested commit.
    async fn reconcile_commits(&self, platform: &Platform, commits: &[Revision]) -> PassSummary {
        let outcomes = join_all(commits.iter().map(|sha| async move {
            match self.store.query_by_commit(platform, sha).await {
                Ok(records) if records.is_empty() => {
                    self.queue.push(Job::revision(platform.clone(), sha.clone()));
                    CommitOutcome {
                        queued: true,
                        unknown: 0,
                    }
                }
                Ok(records) => {
                    debug!(platform = %platform, sha = %sha.short(), results = records.len(), "Already tested");
                    CommitOutcome::default()
                }
                Err(e) => {
                    warn!(platform = %platform, sha = %sha.short(), error = %e, "Result query failed, will retry next pass");
                    CommitOutcome {
                        queued: false,
                        unknown: 1,
                    }
                }
            }
        }))
        .await;

        summarize(platform, commits.len(), outcomes)
    }

    /// Device-granular platforms: per commit, one job naming exactly the
    /// devices without a result.
    async fn reconcile_devices(
        &self,
        platform: &Platform,
        commits: &[Revision],
        devices: &DeviceMap,
    ) -> PassSummary {
        let outcomes = join_all(
            commits
                .iter()
                .map(|sha| self.reconcile_commit_devices(platform, sha, devices)),
        )
        .await;

        summarize(platform, commits.len(), outcomes)
    }

    async fn reconcile_commit_devices(
        &self,
        platform: &Platform,
        sha: &Revision,
        devices: &DeviceMap,
    ) -> CommitOutcome {
        // Completion barrier: nothing is decided until every lookup for this
        // commit has resolved.
        let lookups = join_all(devices.iter().map(|(id, device)| async move {
            let key = ResultKey::device(platform, sha, device);
            (id, device, self.store.get(&key).await)
        }))
        .await;

        let mut missing = DeviceMap::new();
        let mut outcome = CommitOutcome::default();
        for (id, device, lookup) in lookups {
            match lookup {
                Ok(Lookup::NotFound) => {
                    missing.insert(id.clone(), device.clone());
                }
                Ok(Lookup::Found) => {}
                Err(e) => {
                    warn!(
                        platform = %platform,
                        sha = %sha.short(),
                        device = %id,
                        error = %e,
                        "Result lookup failed, will retry next pass"
                    );
                    outcome.unknown += 1;
                }
            }
        }

        match Job::devices(platform.clone(), sha.clone(), missing) {
            Some(job) => {
                self.queue.push(job);
                outcome.queued = true;
            }
            None => debug!(platform = %platform, sha = %sha.short(), "No devices missing results"),
        }
        outcome
    }
}

fn summarize(platform: &Platform, commits: usize, outcomes: Vec<CommitOutcome>) -> PassSummary {
    let mut summary = PassSummary::new(platform, commits);
    for outcome in outcomes {
        summary.jobs_queued += usize::from(outcome.queued);
        summary.unknown += outcome.unknown;
    }
    info!(
        platform = %platform,
        commits,
        jobs = summary.jobs_queued,
        unknown = summary.unknown,
        "Reconciliation pass complete"
    );
    summary
}
