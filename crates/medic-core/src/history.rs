//! Commit history trait.

use async_trait::async_trait;

use crate::{Result, Revision};

/// Lists recent commits of an upstream project.
#[async_trait]
pub trait CommitHistory: Send + Sync {
    /// The `count` most recent commits of `project`, most recent first.
    ///
    /// Fails with [`crate::Error::Lookup`] when the project is unknown.
    async fn recent(&self, project: &str, count: usize) -> Result<Vec<Revision>>;
}
