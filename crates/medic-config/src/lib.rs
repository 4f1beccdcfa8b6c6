//! KDL configuration parsing for the medic build farm.
//!
//! This crate handles:
//! - The system configuration file (medic.kdl)
//! - Platform selection (`android,ios@2.9.0`, `all`)
//! - The platform availability table derived from configuration

pub mod availability;
pub mod error;
pub mod selection;
pub mod system;

pub use availability::Availability;
pub use error::{ConfigError, ConfigResult};
pub use selection::Selection;
pub use system::{
    AppConfig, Inventory, MedicConfig, PlatformConfig, ResultsConfig, WindowConfig, load,
    parse_config,
};
