//! In-process job queue.
//!
//! The queue is append-only and does not deduplicate: deciding what to queue
//! is the reconciler's job. It is never persisted; after a restart the
//! reconciler re-derives the missing work from the result store.

use chrono::{DateTime, Utc};
use medic_core::{Job, JobId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

/// A job waiting for the builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: JobId,
    pub job: Job,
    pub enqueued_at: DateTime<Utc>,
}

/// Cloneable handle used to push jobs. Safe to use from concurrent passes.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<QueuedJob>,
}

/// The single consuming end of a [`JobQueue`].
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<QueuedJob>,
}

impl JobQueue {
    /// Create a queue and its consumer.
    pub fn channel() -> (JobQueue, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (JobQueue { tx }, JobReceiver { rx })
    }

    /// Enqueue a job for the builder.
    pub fn push(&self, job: Job) -> JobId {
        let queued = QueuedJob {
            id: JobId::new(),
            job,
            enqueued_at: Utc::now(),
        };
        let id = queued.id;

        let targets: Vec<String> = queued
            .job
            .targets()
            .map(|(platform, payload)| format!("{}@{}", platform, payload.sha().short()))
            .collect();

        match self.tx.send(queued) {
            Ok(()) => info!(job_id = %id, targets = ?targets, "Queued job"),
            Err(_) => error!(job_id = %id, targets = ?targets, "Job queue is closed, dropping job"),
        }
        id
    }
}

impl JobReceiver {
    /// Next job, or `None` once every [`JobQueue`] handle is dropped.
    pub async fn recv(&mut self) -> Option<QueuedJob> {
        self.rx.recv().await
    }

    /// Take every job queued so far without waiting.
    pub fn drain(&mut self) -> Vec<QueuedJob> {
        let mut jobs = Vec::new();
        while let Ok(job) = self.rx.try_recv() {
            jobs.push(job);
        }
        jobs
    }
}
