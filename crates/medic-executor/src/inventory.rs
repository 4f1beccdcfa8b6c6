//! Fixed device inventory.

use async_trait::async_trait;
use medic_core::{DeviceMap, DeviceScanner, Result};

/// Scanner returning a configured list of networked devices.
pub struct StaticScanner {
    devices: DeviceMap,
}

impl StaticScanner {
    pub fn new(devices: DeviceMap) -> Self {
        Self { devices }
    }
}

#[async_trait]
impl DeviceScanner for StaticScanner {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn scan(&self) -> Result<DeviceMap> {
        Ok(self.devices.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_core::DeviceInfo;

    #[tokio::test]
    async fn test_returns_configured_devices() {
        let mut devices = DeviceMap::new();
        devices.insert("169.254.0.1".to_string(), DeviceInfo::new("10.1", "Z10"));

        let scanner = StaticScanner::new(devices.clone());
        assert_eq!(scanner.scan().await.unwrap(), devices);
        assert_eq!(scanner.name(), "static");
    }
}
