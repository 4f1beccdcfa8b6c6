//! System configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use medic_core::{DeviceInfo, DeviceMap, Platform};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Commits checked per live notification.
pub const DEFAULT_LIVE_WINDOW: usize = 5;
/// Commits checked per platform at startup.
pub const DEFAULT_BACKFILL_WINDOW: usize = 10;

/// System-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicConfig {
    /// Live commit notification feed.
    pub feed: Url,
    /// Result store location.
    pub results: ResultsConfig,
    /// Commit window sizes.
    pub window: WindowConfig,
    /// Test application settings.
    pub app: AppConfig,
    /// Configured platforms, in file order.
    pub platforms: Vec<PlatformConfig>,
    /// Default platform selection when none is given on the command line.
    pub selection: Option<String>,
}

impl MedicConfig {
    /// Platform whose upstream repository is `project`.
    pub fn platform_for_project(&self, project: &str) -> Option<&PlatformConfig> {
        self.platforms.iter().find(|p| p.project == project)
    }

    pub fn platform_names(&self) -> Vec<Platform> {
        self.platforms.iter().map(|p| p.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsConfig {
    pub url: Url,
    pub database: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Commits checked per live notification (K).
    pub live: usize,
    /// Commits checked per platform at startup (M).
    pub backfill: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            live: DEFAULT_LIVE_WINDOW,
            backfill: DEFAULT_BACKFILL_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Command that builds the test application.
    pub builder: String,
    /// Where the test application is built.
    pub output: PathBuf,
    /// Upstream project whose commits trigger a test application rebuild.
    pub commit_hook: Option<String>,
}

/// How a platform discovers its test devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inventory {
    /// No device axis: results are tracked per commit.
    None,
    /// Devices attached through the Android debug bridge.
    Adb,
    /// A fixed list of networked devices.
    Static(DeviceMap),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: Platform,
    /// Upstream repository name used by the commit feed.
    pub project: String,
    /// Local clone used to read commit history.
    pub checkout: PathBuf,
    pub inventory: Inventory,
    /// Signing keychain, needed by platforms without a device axis.
    pub keychain: Option<String>,
    /// Platform builder command. Falls back to the application builder.
    pub builder: Option<String>,
    /// Build output directory.
    pub output: PathBuf,
}

impl PlatformConfig {
    pub fn is_device_granular(&self) -> bool {
        !matches!(self.inventory, Inventory::None)
    }
}

/// Read and parse a configuration file.
pub fn load(path: impl AsRef<Path>) -> ConfigResult<MedicConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse system configuration from KDL text.
pub fn parse_config(kdl: &str) -> ConfigResult<MedicConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut feed = None;
    let mut results = None;
    let mut window = WindowConfig::default();
    let mut app = None;
    let mut platforms: Vec<PlatformConfig> = Vec::new();
    let mut selection = None;

    for node in doc.nodes() {
        match node.name().value() {
            "feed" => {
                let raw = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("feed url".to_string()))?;
                feed = Some(parse_url("feed", &raw)?);
            }
            "results" => {
                let raw = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("results url".to_string()))?;
                results = Some(ResultsConfig {
                    url: parse_url("results", &raw)?,
                    database: get_string_prop(node, "database")
                        .unwrap_or_else(|| "mobilespec_results".to_string()),
                });
            }
            "window" => {
                window = parse_window(node)?;
            }
            "app" => {
                app = Some(parse_app(node)?);
            }
            "platform" => {
                let platform = parse_platform(node)?;
                if platforms.iter().any(|p| p.name == platform.name) {
                    return Err(ConfigError::Duplicate(format!("platform '{}'", platform.name)));
                }
                platforms.push(platform);
            }
            "platforms" => {
                selection = get_first_string_arg(node);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(MedicConfig {
        feed: feed.ok_or_else(|| ConfigError::MissingField("feed".to_string()))?,
        results: results.ok_or_else(|| ConfigError::MissingField("results".to_string()))?,
        window,
        app: app.ok_or_else(|| ConfigError::MissingField("app".to_string()))?,
        platforms,
        selection,
    })
}

fn parse_url(field: &str, raw: &str) -> ConfigResult<Url> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        message: e.to_string(),
    })
}

fn parse_window(node: &KdlNode) -> ConfigResult<WindowConfig> {
    let defaults = WindowConfig::default();
    Ok(WindowConfig {
        live: get_count_prop(node, "live")?.unwrap_or(defaults.live),
        backfill: get_count_prop(node, "backfill")?.unwrap_or(defaults.backfill),
    })
}

fn parse_app(node: &KdlNode) -> ConfigResult<AppConfig> {
    let mut builder = None;
    let mut output = None;
    let mut commit_hook = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "builder" => builder = get_first_string_arg(child),
                "output" => output = get_first_string_arg(child).map(PathBuf::from),
                "commit-hook" | "commit_hook" => commit_hook = get_first_string_arg(child),
                _ => {}
            }
        }
    }

    Ok(AppConfig {
        builder: builder.ok_or_else(|| ConfigError::MissingField("app builder".to_string()))?,
        output: output.unwrap_or_else(|| PathBuf::from("temp/test")),
        commit_hook,
    })
}

fn parse_platform(node: &KdlNode) -> ConfigResult<PlatformConfig> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("platform name".to_string()))?;
    if name.contains('@') || name.contains(',') {
        return Err(ConfigError::InvalidValue {
            field: "platform name".to_string(),
            message: format!("'{}' may not contain '@' or ','", name),
        });
    }

    let project = get_string_prop(node, "project").unwrap_or_else(|| format!("cordova-{}", name));
    let checkout = get_string_prop(node, "checkout")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("libraries").join(&project));

    let mut inventory = Inventory::None;
    let mut keychain = None;
    let mut builder = None;
    let mut output = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "devices" => inventory = parse_inventory(&name, child)?,
                "keychain" => keychain = get_first_string_arg(child),
                "builder" => builder = get_first_string_arg(child),
                "output" => output = get_first_string_arg(child).map(PathBuf::from),
                _ => {}
            }
        }
    }

    Ok(PlatformConfig {
        output: output.unwrap_or_else(|| PathBuf::from("temp").join(&name)),
        name: Platform::new(name),
        project,
        checkout,
        inventory,
        keychain,
        builder,
    })
}

fn parse_inventory(platform: &str, node: &KdlNode) -> ConfigResult<Inventory> {
    let kind = get_first_string_arg(node).unwrap_or_default();

    match kind.as_str() {
        "adb" => Ok(Inventory::Adb),
        "static" => {
            let mut devices = DeviceMap::new();
            if let Some(children) = node.children() {
                for child in children.nodes().iter().filter(|c| c.name().value() == "device") {
                    let id = get_first_string_arg(child).ok_or_else(|| {
                        ConfigError::MissingField(format!("device id for platform '{}'", platform))
                    })?;
                    let version = get_string_prop(child, "version").ok_or_else(|| {
                        ConfigError::MissingField(format!("version of device '{}'", id))
                    })?;
                    let model = get_string_prop(child, "model").ok_or_else(|| {
                        ConfigError::MissingField(format!("model of device '{}'", id))
                    })?;
                    if devices.insert(id.clone(), DeviceInfo::new(version, model)).is_some() {
                        return Err(ConfigError::Duplicate(format!("device '{}'", id)));
                    }
                }
            }
            Ok(Inventory::Static(devices))
        }
        _ => Err(ConfigError::InvalidValue {
            field: format!("devices of platform '{}'", platform),
            message: format!("unknown device inventory: {:?}", kind),
        }),
    }
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_count_prop(node: &KdlNode, name: &str) -> ConfigResult<Option<usize>> {
    let Some(value) = node.get(name) else {
        return Ok(None);
    };
    let invalid = |message: String| ConfigError::InvalidValue {
        field: format!("window {}", name),
        message,
    };
    let count = value
        .as_integer()
        .ok_or_else(|| invalid(format!("expected an integer, got {:?}", value)))?;
    if count < 1 {
        return Err(invalid("must be at least 1".to_string()));
    }
    usize::try_from(count)
        .map(Some)
        .map_err(|e| invalid(e.to_string()))
}
