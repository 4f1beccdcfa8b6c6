//! Live upstream commit notifications.
//!
//! Connects to a long-lived HTTP feed of newline-delimited JSON objects and
//! decodes each into a [`CommitEvent`].

pub mod client;
pub mod stream;

pub use client::connect;
pub use stream::{CommitEvent, CommitStream};
