//! Hardware and toolchain backends for the medic build farm.
//!
//! Provides implementations of the core capability traits:
//! - `adb` and static device scanners
//! - Git commit history
//! - Shell command builders

pub mod adb;
pub mod git;
pub mod inventory;
pub mod shell;

pub use adb::AdbScanner;
pub use git::GitHistory;
pub use inventory::StaticScanner;
pub use shell::ShellBuilder;

pub use medic_core::{Builder, CommitHistory, DeviceScanner};
