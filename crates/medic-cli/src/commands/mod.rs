//! CLI command implementations.

pub mod backfill;
pub mod run;

use anyhow::{Context, Result};
use medic_config::{Availability, Inventory, MedicConfig, Selection};
use std::path::Path;
use tracing::{info, warn};

/// Read and parse the system configuration.
pub fn load_config(path: &Path) -> Result<MedicConfig> {
    medic_config::load(path)
        .with_context(|| format!("Failed to load configuration: {}", path.display()))
}

/// Platforms to build: the command line wins over the configuration file,
/// and with neither every configured platform is tracked.
pub fn resolve_selection(config: &MedicConfig, platforms: Option<&str>) -> Result<Selection> {
    let known = config.platform_names();
    let selection = match platforms.or(config.selection.as_deref()) {
        Some(raw) => Selection::parse(raw, &known).context("Invalid platform selection")?,
        None => Selection::all(&known),
    };
    if selection.is_empty() {
        warn!("No platforms selected");
    }
    Ok(selection)
}

/// Log the platforms that cannot be built on this host.
pub fn report_availability(availability: &Availability) {
    for (platform, reason) in availability.unavailable() {
        warn!(platform = %platform, reason = %reason, "Platform unavailable");
    }
}

pub fn validate(path: &Path, platforms: Option<&str>) -> Result<()> {
    let config = match medic_config::load(path) {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    let selection = resolve_selection(&config, platforms)?;
    let availability = Availability::from_config(&config);

    println!("Configuration is valid");
    println!("  feed:    {}", config.feed);
    println!("  results: {} ({})", config.results.url, config.results.database);
    println!(
        "  window:  live {} / backfill {}",
        config.window.live, config.window.backfill
    );
    println!("\nPlatforms:");
    for platform in &config.platforms {
        let inventory = match &platform.inventory {
            Inventory::None => "per commit".to_string(),
            Inventory::Adb => "adb".to_string(),
            Inventory::Static(devices) => format!("{} static device(s)", devices.len()),
        };
        let mode = if let Some((_, rev)) = selection.frozen.iter().find(|(p, _)| *p == platform.name)
        {
            format!("frozen@{}", rev)
        } else if selection.is_tracked(&platform.name) {
            "tracked".to_string()
        } else {
            "off".to_string()
        };
        let status = availability
            .reason(&platform.name)
            .map(|r| format!("unavailable: {}", r))
            .unwrap_or_else(|| "available".to_string());
        println!(
            "  {:<12} {:<10} {:<22} {}",
            platform.name, mode, inventory, status
        );
    }
    info!(platforms = config.platforms.len(), "Validated configuration");
    Ok(())
}
