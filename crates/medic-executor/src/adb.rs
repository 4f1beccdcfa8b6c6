//! Android debug bridge device scanner.

use async_trait::async_trait;
use futures::future::try_join_all;
use medic_core::{DeviceInfo, DeviceMap, DeviceScanner, Error, Platform, Result};
use regex::Regex;
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, info};

static DEVICE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+device$").expect("Invalid regex"));

/// Scans devices attached through `adb`.
///
/// Only devices in the `device` state are reported; `offline` and
/// `unauthorized` devices cannot run tests.
pub struct AdbScanner {
    platform: Platform,
    adb: String,
}

impl AdbScanner {
    pub fn new(platform: Platform) -> Self {
        Self::with_binary(platform, "adb")
    }

    pub fn with_binary(platform: Platform, adb: impl Into<String>) -> Self {
        Self {
            platform,
            adb: adb.into(),
        }
    }

    async fn adb(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.adb)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::scan(self.platform.as_str(), format!("running {}: {}", self.adb, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::scan(
                self.platform.as_str(),
                format!("{} {} failed: {}", self.adb, args.join(" "), stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn describe(&self, serial: String) -> Result<(String, DeviceInfo)> {
        let version = self
            .adb(&["-s", serial.as_str(), "shell", "getprop", "ro.build.version.release"])
            .await?;
        let model = self
            .adb(&["-s", serial.as_str(), "shell", "getprop", "ro.product.model"])
            .await?;
        debug!(serial = %serial, version = %version, model = %model, "Found device");
        Ok((serial, DeviceInfo::new(version, model)))
    }
}

/// Serials of ready devices in `adb devices` output.
fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| DEVICE_LINE.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

#[async_trait]
impl DeviceScanner for AdbScanner {
    fn name(&self) -> &'static str {
        "adb"
    }

    async fn scan(&self) -> Result<DeviceMap> {
        let listing = self.adb(&["devices"]).await?;
        let serials = parse_device_list(&listing);

        let devices = try_join_all(serials.into_iter().map(|serial| self.describe(serial))).await?;
        let devices: DeviceMap = devices.into_iter().collect();

        info!(platform = %self.platform, count = devices.len(), "Scanned devices");
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_list() {
        let output = "List of devices attached\n\
                      0123456789ABCDEF\tdevice\n\
                      emulator-5554\toffline\n\
                      HT4CTJT00001\tunauthorized\n\
                      192.168.1.20:5555\tdevice\n\n";
        assert_eq!(
            parse_device_list(output),
            vec!["0123456789ABCDEF", "192.168.1.20:5555"]
        );
    }

    #[test]
    fn test_parse_empty_device_list() {
        assert!(parse_device_list("List of devices attached\n").is_empty());
    }

    #[tokio::test]
    async fn test_missing_adb_binary_is_a_scan_error() {
        let scanner = AdbScanner::with_binary(Platform::new("android"), "/nonexistent/adb");
        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, Error::Scan { .. }));
    }
}
