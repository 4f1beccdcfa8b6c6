//! Builders that shell out to a configured command.

use async_trait::async_trait;
use medic_core::{BuildOptions, Builder, Error, Result, Revision};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// Environment variable carrying the JSON encoded [`BuildOptions`].
pub const OPTIONS_ENV: &str = "MEDIC_BUILD_OPTIONS";

/// Runs `<command> <output> <revision>`.
pub struct ShellBuilder {
    command: String,
}

impl ShellBuilder {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Builder for ShellBuilder {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn build(
        &self,
        output: &Path,
        revision: &Revision,
        options: Option<&BuildOptions>,
    ) -> Result<()> {
        let options_json = match options {
            Some(options) => serde_json::to_string(options)
                .map_err(|e| Error::Internal(format!("encoding build options: {}", e)))?,
            None => "null".to_string(),
        };

        info!(
            command = %self.command,
            output = %output.display(),
            revision = %revision.short(),
            "Starting build"
        );

        let result = Command::new(&self.command)
            .arg(output)
            .arg(revision.as_str())
            .env(OPTIONS_ENV, options_json)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Build(format!("running {}: {}", self.command, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(20).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            warn!(command = %self.command, status = %result.status, "Build command failed");
            return Err(Error::Build(format!(
                "{} exited with {}: {}",
                self.command,
                result.status,
                tail.join("\n")
            )));
        }

        info!(command = %self.command, revision = %revision.short(), "Build finished");
        Ok(())
    }
}
