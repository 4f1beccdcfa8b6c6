//! Which configured platforms can currently be built on this host.

use crate::system::{Inventory, MedicConfig, PlatformConfig};
use medic_core::Platform;
use std::collections::BTreeMap;

/// Immutable availability table computed once from configuration.
#[derive(Debug, Clone, Default)]
pub struct Availability {
    unavailable: BTreeMap<Platform, String>,
    available: Vec<Platform>,
}

impl Availability {
    pub fn from_config(config: &MedicConfig) -> Self {
        let mut table = Availability::default();
        for platform in &config.platforms {
            match unavailable_reason(platform) {
                Some(reason) => {
                    table.unavailable.insert(platform.name.clone(), reason);
                }
                None => table.available.push(platform.name.clone()),
            }
        }
        table
    }

    pub fn is_available(&self, platform: &Platform) -> bool {
        self.available.contains(platform)
    }

    /// Why a configured platform cannot be built, if it cannot.
    pub fn reason(&self, platform: &Platform) -> Option<&str> {
        self.unavailable.get(platform).map(String::as_str)
    }

    pub fn unavailable(&self) -> impl Iterator<Item = (&Platform, &str)> {
        self.unavailable.iter().map(|(p, r)| (p, r.as_str()))
    }
}

fn unavailable_reason(platform: &PlatformConfig) -> Option<String> {
    match &platform.inventory {
        Inventory::Adb => None,
        Inventory::Static(devices) if devices.is_empty() => {
            Some("no devices configured".to_string())
        }
        Inventory::Static(_) => None,
        Inventory::None => match platform.keychain.as_deref() {
            Some(keychain) if !keychain.is_empty() => None,
            _ => Some("no signing keychain configured".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config;

    #[test]
    fn test_availability_table() {
        let kdl = r#"
            feed "http://localhost/json"
            results "http://localhost:5984"
            app {
                builder "./build-app.sh"
            }
            platform "android" {
                devices "adb"
            }
            platform "ios" {
                keychain ""
            }
            platform "blackberry" {
                devices "static"
            }
            platform "playbook" {
                devices "static" {
                    device "10.0.0.1" version="2.1" model="PlayBook"
                }
            }
        "#;
        let config = parse_config(kdl).unwrap();
        let table = Availability::from_config(&config);

        assert!(table.is_available(&Platform::new("android")));
        assert!(table.is_available(&Platform::new("playbook")));
        assert!(!table.is_available(&Platform::new("ios")));
        assert!(!table.is_available(&Platform::new("blackberry")));
        assert_eq!(
            table.reason(&Platform::new("blackberry")),
            Some("no devices configured")
        );
        assert!(!table.is_available(&Platform::new("unknown")));
        assert_eq!(table.unavailable().count(), 2);
    }
}
