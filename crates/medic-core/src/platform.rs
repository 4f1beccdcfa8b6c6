//! Platform and revision identifiers.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// A build target platform, e.g. `android` or `ios`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
#[display("{_0}")]
pub struct Platform(String);

impl Platform {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Platform {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// An opaque source revision: a commit sha, a tag, or `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
#[display("{_0}")]
pub struct Revision(String);

impl Revision {
    pub fn new(rev: impl Into<String>) -> Self {
        Self(rev.into())
    }

    /// The symbolic revision for the tip of the default branch.
    pub fn head() -> Self {
        Self("HEAD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines (first 7 characters).
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(7) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl From<&str> for Revision {
    fn from(rev: &str) -> Self {
        Self(rev.to_string())
    }
}
