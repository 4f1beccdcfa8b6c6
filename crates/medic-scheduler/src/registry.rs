//! Static platform registry.
//!
//! Resolves each configured platform to its device scanner and builder once
//! at startup.

use medic_config::{Inventory, MedicConfig};
use medic_core::{Builder, DeviceScanner, Platform, job::TEST_APP};
use medic_executor::{AdbScanner, GitHistory, ShellBuilder, StaticScanner};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Capabilities of one platform.
#[derive(Clone)]
pub struct PlatformBackend {
    pub platform: Platform,
    /// Upstream repository name announced by the commit feed.
    pub project: String,
    /// Device inventory. `None` for platforms tracked per commit.
    pub scanner: Option<Arc<dyn DeviceScanner>>,
    pub builder: Arc<dyn Builder>,
    pub output: PathBuf,
}

impl PlatformBackend {
    pub fn is_device_granular(&self) -> bool {
        self.scanner.is_some()
    }
}

impl std::fmt::Debug for PlatformBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformBackend")
            .field("platform", &self.platform)
            .field("project", &self.project)
            .field("scanner", &self.scanner.as_ref().map(|s| s.name()))
            .field("builder", &self.builder.name())
            .field("output", &self.output)
            .finish()
    }
}

/// Platform backends keyed by platform, plus the test application builder.
pub struct Registry {
    platforms: BTreeMap<Platform, PlatformBackend>,
    app_builder: Arc<dyn Builder>,
    app_output: PathBuf,
}

impl Registry {
    pub fn new(app_builder: Arc<dyn Builder>, app_output: impl Into<PathBuf>) -> Self {
        Self {
            platforms: BTreeMap::new(),
            app_builder,
            app_output: app_output.into(),
        }
    }

    pub fn with_platform(mut self, backend: PlatformBackend) -> Self {
        self.platforms.insert(backend.platform.clone(), backend);
        self
    }

    /// Build the registry for every configured platform.
    pub fn from_config(config: &MedicConfig) -> Self {
        let app_builder: Arc<dyn Builder> = Arc::new(ShellBuilder::new(&config.app.builder));
        let mut registry = Registry::new(app_builder.clone(), &config.app.output);

        for platform in &config.platforms {
            let scanner: Option<Arc<dyn DeviceScanner>> = match &platform.inventory {
                Inventory::None => None,
                Inventory::Adb => Some(Arc::new(AdbScanner::new(platform.name.clone()))),
                Inventory::Static(devices) => Some(Arc::new(StaticScanner::new(devices.clone()))),
            };
            let builder: Arc<dyn Builder> = match &platform.builder {
                Some(command) => Arc::new(ShellBuilder::new(command)),
                None => app_builder.clone(),
            };

            registry = registry.with_platform(PlatformBackend {
                platform: platform.name.clone(),
                project: platform.project.clone(),
                scanner,
                builder,
                output: platform.output.clone(),
            });
        }

        registry
    }

    pub fn get(&self, platform: &Platform) -> Option<&PlatformBackend> {
        self.platforms.get(platform)
    }

    /// Backend whose upstream repository is `project`.
    pub fn for_project(&self, project: &str) -> Option<&PlatformBackend> {
        self.platforms.values().find(|b| b.project == project)
    }

    pub fn app_builder(&self) -> &Arc<dyn Builder> {
        &self.app_builder
    }

    pub fn app_output(&self) -> &Path {
        &self.app_output
    }

    /// Builder and output directory for a job target. The `test` target
    /// resolves to the test application builder.
    pub fn builder_for(&self, platform: &Platform) -> Option<(&Arc<dyn Builder>, &Path)> {
        if platform.as_str() == TEST_APP {
            return Some((&self.app_builder, &self.app_output));
        }
        self.platforms
            .get(platform)
            .map(|b| (&b.builder, b.output.as_path()))
    }
}

/// Commit history reading every configured platform's local checkout.
pub fn git_history(config: &MedicConfig) -> GitHistory {
    config
        .platforms
        .iter()
        .fold(GitHistory::new(), |history, p| {
            history.with_checkout(p.project.clone(), p.checkout.clone())
        })
}
