//! Build reconciliation and job queueing for the medic build farm.
//!
//! Decides which (platform, commit, device) combinations lack test results
//! and queues exactly those builds. All state is recomputed from the result
//! store on every pass; nothing here is persisted.

pub mod queue;
pub mod reconcile;
pub mod registry;
pub mod worker;

pub use queue::{JobQueue, JobReceiver, QueuedJob};
pub use reconcile::{EngineSettings, PassSummary, Reconciler, SkipReason};
pub use registry::{PlatformBackend, Registry};
pub use worker::QueueWorker;
