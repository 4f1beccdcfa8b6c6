//! Result store keys and query trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DeviceInfo, Platform, Result, Revision};

/// Identifies a test result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultKey {
    /// Result for one commit on one kind of device.
    Device {
        platform: Platform,
        sha: Revision,
        version: String,
        model: String,
    },
    /// Result for a commit on a platform without a device axis.
    Commit { platform: Platform, sha: Revision },
}

impl ResultKey {
    pub fn device(platform: &Platform, sha: &Revision, device: &DeviceInfo) -> Self {
        ResultKey::Device {
            platform: platform.clone(),
            sha: sha.clone(),
            version: device.version.clone(),
            model: device.model.clone(),
        }
    }

    pub fn commit(platform: &Platform, sha: &Revision) -> Self {
        ResultKey::Commit {
            platform: platform.clone(),
            sha: sha.clone(),
        }
    }

    pub fn platform(&self) -> &Platform {
        match self {
            ResultKey::Device { platform, .. } | ResultKey::Commit { platform, .. } => platform,
        }
    }

    pub fn sha(&self) -> &Revision {
        match self {
            ResultKey::Device { sha, .. } | ResultKey::Commit { sha, .. } => sha,
        }
    }

    /// Composite document id: `platform__sha__version__model` or `platform__sha`.
    pub fn document_id(&self) -> String {
        match self {
            ResultKey::Device {
                platform,
                sha,
                version,
                model,
            } => format!("{}__{}__{}__{}", platform, sha, version, model),
            ResultKey::Commit { platform, sha } => format!("{}__{}", platform, sha),
        }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.document_id())
    }
}

/// Outcome of a point lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found,
    NotFound,
}

/// A row returned by a commit view query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: serde_json::Value,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Query contract of the persistent result store.
///
/// A failed query must surface as [`crate::Error::Query`], never as
/// [`Lookup::NotFound`].
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Point lookup by composite key.
    async fn get(&self, key: &ResultKey) -> Result<Lookup>;

    /// All records for a commit of a platform. Empty means untested.
    async fn query_by_commit(
        &self,
        platform: &Platform,
        sha: &Revision,
    ) -> Result<Vec<ResultRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_document_id() {
        let key = ResultKey::device(
            &Platform::new("android"),
            &Revision::new("abc123"),
            &DeviceInfo::new("4.2.2", "Nexus 4"),
        );
        assert_eq!(key.document_id(), "android__abc123__4.2.2__Nexus 4");
        assert_eq!(key.sha().as_str(), "abc123");
    }

    #[test]
    fn test_commit_document_id() {
        let key = ResultKey::commit(&Platform::new("ios"), &Revision::new("abc123"));
        assert_eq!(key.to_string(), "ios__abc123");
        assert_eq!(key.platform().as_str(), "ios");
    }
}
