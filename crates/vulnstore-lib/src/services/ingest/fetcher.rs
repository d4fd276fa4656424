// Report Fetcher
// Downloads report files from a trusted source with a single retry

use async_trait::async_trait;
use reqwest::Client;

use super::error::{IngestError, IngestResult};
use crate::utils::config::FetchConfig;

/// Attempts per file, including the first
pub const FETCH_ATTEMPTS: u32 = 2;

/// Source of raw report bytes
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    /// Fetch `file_name` under `source`, returning the full body
    async fn fetch(&self, source: &str, file_name: &str) -> IngestResult<Vec<u8>>;
}

/// Fetcher over HTTP(S)
pub struct HttpFetcher {
    config: FetchConfig,
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self { config, client })
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request error: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read body: {}", e))?;
        Ok(body.to_vec())
    }
}

/// Join a source and a file name with exactly one slash
pub fn resource_url(source: &str, file_name: &str) -> String {
    format!("{}/{}", source.trim_end_matches('/'), file_name)
}

#[async_trait]
impl ReportFetcher for HttpFetcher {
    async fn fetch(&self, source: &str, file_name: &str) -> IngestResult<Vec<u8>> {
        if !source.starts_with(&self.config.trusted_prefix) {
            log::warn!("[fetch] Rejected untrusted source {}", source);
            return Err(IngestError::InvalidSource {
                source_url: source.to_string(),
            });
        }

        let url = resource_url(source, file_name);
        let mut last_error = String::new();

        for attempt in 1..=FETCH_ATTEMPTS {
            match self.try_fetch(&url).await {
                Ok(body) => {
                    log::info!(
                        "[fetch] Fetched {} ({} bytes, attempt {})",
                        url,
                        body.len(),
                        attempt
                    );
                    return Ok(body);
                }
                Err(message) => {
                    log::warn!(
                        "[fetch] Attempt {}/{} for {} failed: {}",
                        attempt,
                        FETCH_ATTEMPTS,
                        url,
                        message
                    );
                    last_error = message;
                    if attempt < FETCH_ATTEMPTS {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        Err(IngestError::FetchFailed {
            url,
            attempts: FETCH_ATTEMPTS,
            message: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn local_config() -> FetchConfig {
        FetchConfig {
            trusted_prefix: "http://127.0.0.1".to_string(),
            retry_delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn fail_first(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, &'static str) {
        if hits.fetch_add(1, Ordering::SeqCst) == 0 {
            (StatusCode::INTERNAL_SERVER_ERROR, "boom")
        } else {
            (StatusCode::OK, "[]")
        }
    }

    async fn always_fail(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
        hits.fetch_add(1, Ordering::SeqCst);
        StatusCode::BAD_GATEWAY
    }

    #[test]
    fn test_resource_url() {
        assert_eq!(resource_url("https://h/a/", "f.json"), "https://h/a/f.json");
        assert_eq!(resource_url("https://h/a", "f.json"), "https://h/a/f.json");
    }

    #[tokio::test]
    async fn test_rejects_untrusted_source() {
        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();

        let err = fetcher
            .fetch("https://example.com/acme/scans", "scan.json")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::InvalidSource { .. }));
    }

    #[tokio::test]
    async fn test_retries_once_then_succeeds() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = serve(
            Router::new()
                .route("/reports/{file}", get(fail_first))
                .with_state(hits.clone()),
        )
        .await;
        let fetcher = HttpFetcher::new(local_config()).unwrap();

        let body = fetcher
            .fetch(&format!("{}/reports/", base), "scan.json")
            .await
            .unwrap();

        assert_eq!(body, b"[]");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fails_after_two_attempts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = serve(
            Router::new()
                .route("/reports/{file}", get(always_fail))
                .with_state(hits.clone()),
        )
        .await;
        let fetcher = HttpFetcher::new(local_config()).unwrap();

        let err = fetcher
            .fetch(&format!("{}/reports", base), "scan.json")
            .await
            .unwrap_err();

        match err {
            IngestError::FetchFailed { url, attempts, message } => {
                assert!(url.ends_with("/reports/scan.json"));
                assert_eq!(attempts, 2);
                assert!(message.contains("502"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
