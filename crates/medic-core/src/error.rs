//! Error types for medic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The commit event transport failed. Terminal for the stream.
    #[error("commit stream error: {0}")]
    Stream(String),

    /// Commit history could not be read for a project.
    #[error("commit history unavailable for {project}: {message}")]
    Lookup { project: String, message: String },

    /// The device inventory of a platform could not be scanned.
    #[error("device scan failed for {platform}: {message}")]
    Scan { platform: String, message: String },

    /// A single result store query failed.
    #[error("result query failed for {key}: {message}")]
    Query { key: String, message: String },

    #[error("build failed: {0}")]
    Build(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn lookup(project: impl Into<String>, message: impl ToString) -> Self {
        Error::Lookup {
            project: project.into(),
            message: message.to_string(),
        }
    }

    pub fn scan(platform: impl Into<String>, message: impl ToString) -> Self {
        Error::Scan {
            platform: platform.into(),
            message: message.to_string(),
        }
    }

    pub fn query(key: impl Into<String>, message: impl ToString) -> Self {
        Error::Query {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
