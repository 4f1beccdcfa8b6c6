//! Core domain types and traits for the medic build farm.
//!
//! This crate contains:
//! - Platform, revision and device identifiers
//! - Result store keys and the `ResultStore` trait
//! - Device inventory (`DeviceScanner`) and commit history (`CommitHistory`) traits
//! - Job payloads and the `Builder` trait
//! - The error taxonomy shared by every other crate

pub mod device;
pub mod error;
pub mod history;
pub mod id;
pub mod job;
pub mod platform;
pub mod results;

pub use device::{DeviceInfo, DeviceMap, DeviceScanner};
pub use error::{Error, Result};
pub use history::CommitHistory;
pub use id::JobId;
pub use job::{BuildOptions, Builder, Job, JobPayload};
pub use platform::{Platform, Revision};
pub use results::{Lookup, ResultKey, ResultRecord, ResultStore};
