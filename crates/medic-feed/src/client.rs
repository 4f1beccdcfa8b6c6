//! Feed connection.

use medic_core::{Error, Result};
use tracing::{info, warn};
use url::Url;

use crate::CommitStream;

/// Open the commit feed at `url`.
///
/// Connection failures and non-success responses are reported as
/// [`Error::Stream`]; reconnecting is left to the caller.
pub async fn connect(url: &Url) -> Result<CommitStream> {
    let response = reqwest::get(url.clone()).await.map_err(|e| {
        warn!(url = %url, error = %e, "Commit feed connection failed");
        Error::Stream(e.to_string())
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(url = %url, status = %status, "Commit feed rejected connection");
        return Err(Error::Stream(format!(
            "feed returned {}: {}",
            status,
            body.trim()
        )));
    }

    info!(url = %url, "Connected to commit feed");
    Ok(CommitStream::new(response.bytes_stream()))
}
