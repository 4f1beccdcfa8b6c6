//! CouchDB result store client.

use async_trait::async_trait;
use medic_core::{Error, Lookup, Platform, Result, ResultKey, ResultRecord, ResultStore, Revision};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// Design document holding the per-platform commit views.
const RESULTS_DESIGN: &str = "results";

#[derive(Debug, Deserialize)]
struct ViewResponse {
    #[serde(default)]
    rows: Vec<ResultRecord>,
}

/// Result store backed by a CouchDB database of test result documents.
///
/// Device results are stored under `platform__sha__version__model` ids;
/// each platform has a view in the `results` design document keyed by sha.
pub struct CouchResultStore {
    client: reqwest::Client,
    base_url: String,
    database: String,
}

impl CouchResultStore {
    pub fn new(url: &Url, database: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url, database)
    }

    pub fn with_client(client: reqwest::Client, url: &Url, database: impl Into<String>) -> Self {
        Self {
            client,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            database: database.into(),
        }
    }

    fn document_url(&self, key: &ResultKey) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(&self.database),
            urlencoding::encode(&key.document_id())
        )
    }

    fn view_url(&self, platform: &Platform, sha: &Revision) -> String {
        // View keys are JSON values, so the sha is sent quoted.
        let key = format!("\"{}\"", sha);
        format!(
            "{}/{}/_design/{}/_view/{}?key={}",
            self.base_url,
            urlencoding::encode(&self.database),
            RESULTS_DESIGN,
            urlencoding::encode(platform.as_str()),
            urlencoding::encode(&key)
        )
    }
}

#[async_trait]
impl ResultStore for CouchResultStore {
    async fn get(&self, key: &ResultKey) -> Result<Lookup> {
        let url = self.document_url(key);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Result lookup failed");
                Error::query(key.document_id(), e)
            })?;

        match response.status() {
            StatusCode::OK => Ok(Lookup::Found),
            StatusCode::NOT_FOUND => {
                debug!(key = %key, "No result document");
                Ok(Lookup::NotFound)
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                warn!(key = %key, status = %status, "Result lookup rejected");
                Err(Error::query(
                    key.document_id(),
                    format!("{}: {}", status, text.trim()),
                ))
            }
        }
    }

    async fn query_by_commit(
        &self,
        platform: &Platform,
        sha: &Revision,
    ) -> Result<Vec<ResultRecord>> {
        let key = ResultKey::commit(platform, sha);
        let url = self.view_url(platform, sha);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(platform = %platform, sha = %sha.short(), error = %e, "Result view query failed");
                Error::query(key.document_id(), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(platform = %platform, sha = %sha.short(), status = %status, "Result view query rejected");
            return Err(Error::query(
                key.document_id(),
                format!("{}: {}", status, text.trim()),
            ));
        }

        let view: ViewResponse = response
            .json()
            .await
            .map_err(|e| Error::query(key.document_id(), e))?;

        Ok(view.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_core::DeviceInfo;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response on a local port. The handle resolves
    /// to the request line the store sent.
    async fn serve_once(status: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });

        (url, handle)
    }

    fn local_store(url: &Url) -> CouchResultStore {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        CouchResultStore::with_client(client, url, "results")
    }

    fn device_key() -> ResultKey {
        ResultKey::device(
            &Platform::new("android"),
            &Revision::new("abc123"),
            &DeviceInfo::new("4.2.2", "Nexus 4"),
        )
    }

    fn store() -> CouchResultStore {
        let url = Url::parse("http://localhost:5984/").unwrap();
        CouchResultStore::new(&url, "mobilespec_results")
    }

    #[test]
    fn test_document_url_is_encoded() {
        let key = ResultKey::device(
            &Platform::new("android"),
            &Revision::new("abc123"),
            &DeviceInfo::new("4.2.2", "Nexus 4"),
        );
        assert_eq!(
            store().document_url(&key),
            "http://localhost:5984/mobilespec_results/android__abc123__4.2.2__Nexus%204"
        );
    }

    #[test]
    fn test_view_url_quotes_key() {
        let url = store().view_url(&Platform::new("ios"), &Revision::new("abc123"));
        assert_eq!(
            url,
            "http://localhost:5984/mobilespec_results/_design/results/_view/ios?key=%22abc123%22"
        );
    }

    #[test]
    fn test_view_response_rows() {
        let view: ViewResponse = serde_json::from_str(
            r#"{"total_rows": 3, "offset": 0, "rows": [
                {"id": "ios__abc123", "key": "abc123", "value": {"tests": 120, "failures": 2}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].id.as_deref(), Some("ios__abc123"));
        assert_eq!(view.rows[0].value["failures"], 2);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_a_query_error() {
        // Port 9 (discard) is not expected to serve HTTP.
        let url = Url::parse("http://127.0.0.1:9").unwrap();
        let store = CouchResultStore::new(&url, "results");
        let key = ResultKey::commit(&Platform::new("ios"), &Revision::new("abc"));

        let err = store.get(&key).await.unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
    }

    #[tokio::test]
    async fn test_document_present_is_found() {
        let (url, request) = serve_once("200 OK", r#"{"_id":"android__abc123__4.2.2__Nexus 4"}"#).await;

        let lookup = local_store(&url).get(&device_key()).await.unwrap();
        assert_eq!(lookup, Lookup::Found);
        assert_eq!(
            request.await.unwrap(),
            "GET /results/android__abc123__4.2.2__Nexus%204 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let (url, _) = serve_once("404 Not Found", r#"{"error":"not_found","reason":"missing"}"#).await;

        let lookup = local_store(&url).get(&device_key()).await.unwrap();
        assert_eq!(lookup, Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_server_error_is_a_query_error_not_missing() {
        let (url, _) = serve_once("500 Internal Server Error", r#"{"error":"unknown_error"}"#).await;

        let err = local_store(&url).get(&device_key()).await.unwrap_err();
        match err {
            Error::Query { key, message } => {
                assert_eq!(key, "android__abc123__4.2.2__Nexus 4");
                assert!(message.contains("500"));
            }
            other => panic!("expected a query error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_lookup_is_a_query_error() {
        let (url, _) = serve_once("401 Unauthorized", r#"{"error":"unauthorized"}"#).await;

        let err = local_store(&url).get(&device_key()).await.unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
    }

    #[tokio::test]
    async fn test_view_query_returns_rows() {
        let (url, request) = serve_once(
            "200 OK",
            r#"{"total_rows":1,"offset":0,"rows":[{"id":"ios__abc123","key":"abc123","value":null}]}"#,
        )
        .await;

        let rows = local_store(&url)
            .query_by_commit(&Platform::new("ios"), &Revision::new("abc123"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_deref(), Some("ios__abc123"));
        assert_eq!(
            request.await.unwrap(),
            "GET /results/_design/results/_view/ios?key=%22abc123%22 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_empty_view_means_untested() {
        let (url, _) = serve_once("200 OK", r#"{"total_rows":0,"offset":0,"rows":[]}"#).await;

        let rows = local_store(&url)
            .query_by_commit(&Platform::new("ios"), &Revision::new("abc123"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_view_rejection_is_a_query_error() {
        let (url, _) = serve_once("503 Service Unavailable", r#"{"error":"timeout"}"#).await;

        let err = local_store(&url)
            .query_by_commit(&Platform::new("ios"), &Revision::new("abc123"))
            .await
            .unwrap_err();
        match err {
            Error::Query { key, message } => {
                assert_eq!(key, "ios__abc123");
                assert!(message.contains("503"));
            }
            other => panic!("expected a query error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_view_body_is_a_query_error() {
        let (url, _) = serve_once("200 OK", "<html>proxy login</html>").await;

        let err = local_store(&url)
            .query_by_commit(&Platform::new("ios"), &Revision::new("abc123"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
    }
}
