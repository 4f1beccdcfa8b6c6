//! Test result store for the medic build farm.
//!
//! Provides the CouchDB-backed [`CouchResultStore`] and an in-memory
//! [`MemoryResultStore`] used for dry runs and tests.

pub mod couch;
pub mod memory;

pub use couch::CouchResultStore;
pub use memory::MemoryResultStore;
