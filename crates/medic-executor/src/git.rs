//! Commit history read from local git clones.

use async_trait::async_trait;
use medic_core::{CommitHistory, Error, Result, Revision};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Reads recent commits with `git log` from one checkout per project.
#[derive(Debug, Default)]
pub struct GitHistory {
    checkouts: HashMap<String, PathBuf>,
}

impl GitHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the local clone of `project`.
    pub fn with_checkout(mut self, project: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.checkouts.insert(project.into(), path.into());
        self
    }
}

fn parse_log(output: &str) -> Vec<Revision> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(Revision::new)
        .collect()
}

#[async_trait]
impl CommitHistory for GitHistory {
    async fn recent(&self, project: &str, count: usize) -> Result<Vec<Revision>> {
        let checkout = self
            .checkouts
            .get(project)
            .ok_or_else(|| Error::lookup(project, "unknown project"))?;

        if count == 0 {
            return Ok(Vec::new());
        }

        let output = Command::new("git")
            .arg("-C")
            .arg(checkout)
            .args(["log", "-n", &count.to_string(), "--pretty=format:%H"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::lookup(project, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::lookup(project, stderr.trim()));
        }

        let commits = parse_log(&String::from_utf8_lossy(&output.stdout));
        debug!(project = %project, count = commits.len(), "Read recent commits");
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log() {
        let commits = parse_log("aaa111\nbbb222\n\nccc333");
        assert_eq!(
            commits,
            vec![
                Revision::new("aaa111"),
                Revision::new("bbb222"),
                Revision::new("ccc333")
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_project_is_a_lookup_error() {
        let history = GitHistory::new().with_checkout("cordova-android", "/tmp/none");
        let err = history.recent("cordova-wp8", 5).await.unwrap_err();
        assert!(matches!(err, Error::Lookup { ref project, .. } if project == "cordova-wp8"));
    }

    #[tokio::test]
    async fn test_zero_count_needs_no_git() {
        let history = GitHistory::new().with_checkout("cordova-android", "/nonexistent");
        assert!(history.recent("cordova-android", 0).await.unwrap().is_empty());
    }
}
