//! Build jobs and the builder trait.
//!
//! A job maps platform names to payloads:
//! - `{"ios": {"sha": "..."}}` for platforms without a device axis
//! - `{"android": {"sha": "...", "numDevices": 1, "devices": {"<id>": {"version": .., "model": ..}}}}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{DeviceMap, Platform, Result, Revision};

/// Platform key used for test application rebuilds.
pub const TEST_APP: &str = "test";

/// Work for one platform within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobPayload {
    /// Build and run on the listed devices only.
    Devices {
        sha: Revision,
        #[serde(rename = "numDevices")]
        num_devices: usize,
        devices: DeviceMap,
    },
    /// Build a single revision.
    Revision { sha: Revision },
}

impl JobPayload {
    pub fn sha(&self) -> &Revision {
        match self {
            JobPayload::Devices { sha, .. } | JobPayload::Revision { sha } => sha,
        }
    }

    /// Devices targeted by this payload, if it has a device axis.
    pub fn devices(&self) -> Option<&DeviceMap> {
        match self {
            JobPayload::Devices { devices, .. } => Some(devices),
            JobPayload::Revision { .. } => None,
        }
    }
}

/// A unit of work for the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Job {
    targets: BTreeMap<Platform, JobPayload>,
}

impl Job {
    /// Job building one revision of a platform.
    pub fn revision(platform: Platform, sha: Revision) -> Self {
        let mut targets = BTreeMap::new();
        targets.insert(platform, JobPayload::Revision { sha });
        Self { targets }
    }

    /// Job targeting the given devices. Returns `None` when `devices` is
    /// empty: a job always carries at least one unit of missing work.
    pub fn devices(platform: Platform, sha: Revision, devices: DeviceMap) -> Option<Self> {
        if devices.is_empty() {
            return None;
        }
        let mut targets = BTreeMap::new();
        targets.insert(
            platform,
            JobPayload::Devices {
                sha,
                num_devices: devices.len(),
                devices,
            },
        );
        Some(Self { targets })
    }

    /// Job rebuilding the test application at `sha`.
    pub fn test_app(sha: Revision) -> Self {
        Self::revision(Platform::new(TEST_APP), sha)
    }

    pub fn targets(&self) -> impl Iterator<Item = (&Platform, &JobPayload)> {
        self.targets.iter()
    }

    pub fn get(&self, platform: &Platform) -> Option<&JobPayload> {
        self.targets.get(platform)
    }
}

/// Extra inputs handed to a builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Devices the build must be deployed to. Empty means "all attached".
    pub devices: DeviceMap,
}

/// Prepares and runs a build for one platform or for the test application.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Name of this builder backend.
    fn name(&self) -> &'static str;

    /// Build `revision` into `output`.
    async fn build(
        &self,
        output: &Path,
        revision: &Revision,
        options: Option<&BuildOptions>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceInfo;
    use serde_json::json;

    #[test]
    fn test_revision_job_shape() {
        let job = Job::revision(Platform::new("ios"), Revision::new("c2"));
        assert_eq!(serde_json::to_value(&job).unwrap(), json!({"ios": {"sha": "c2"}}));
    }

    #[test]
    fn test_device_job_shape() {
        let mut devices = DeviceMap::new();
        devices.insert("d2".to_string(), DeviceInfo::new("v2", "m2"));

        let job = Job::devices(Platform::new("android"), Revision::new("c1"), devices).unwrap();
        assert_eq!(
            serde_json::to_value(&job).unwrap(),
            json!({
                "android": {
                    "sha": "c1",
                    "numDevices": 1,
                    "devices": {"d2": {"version": "v2", "model": "m2"}}
                }
            })
        );
    }

    #[test]
    fn test_empty_device_job_is_not_constructed() {
        let job = Job::devices(Platform::new("android"), Revision::new("c1"), DeviceMap::new());
        assert!(job.is_none());
    }

    #[test]
    fn test_deserialize_both_payload_shapes() {
        let job: Job = serde_json::from_value(json!({
            "android": {"sha": "c1", "numDevices": 1, "devices": {"d1": {"version": "v1", "model": "m1"}}},
            "ios": {"sha": "c2"}
        }))
        .unwrap();

        let android = job.get(&Platform::new("android")).unwrap();
        assert_eq!(android.devices().map(|d| d.len()), Some(1));
        let ios = job.get(&Platform::new("ios")).unwrap();
        assert_eq!(ios.sha().as_str(), "c2");
        assert!(ios.devices().is_none());
    }
}
