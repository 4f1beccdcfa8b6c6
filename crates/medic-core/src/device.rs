//! Test devices and the device inventory trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Result;

/// Identifying attributes of one connected test device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// OS version the device runs, e.g. `4.2.2`.
    pub version: String,
    /// Hardware model, e.g. `Nexus 4`.
    pub model: String,
}

impl DeviceInfo {
    pub fn new(version: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            model: model.into(),
        }
    }
}

/// Devices keyed by their identifier (adb serial, IP address, ...).
pub type DeviceMap = BTreeMap<String, DeviceInfo>;

/// Enumerates the test devices currently reachable for one platform.
///
/// Inventories are never cached: every reconciliation pass scans again.
#[async_trait]
pub trait DeviceScanner: Send + Sync {
    /// Name of this scanner backend.
    fn name(&self) -> &'static str;

    /// Scan for devices. Fails with [`crate::Error::Scan`].
    async fn scan(&self) -> Result<DeviceMap>;
}
