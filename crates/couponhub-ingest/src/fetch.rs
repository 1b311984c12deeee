//! HTTP fetch collaborator used by provider adapters.
//!
//! [`Fetcher::fetch`] never returns an error: failures are reported through
//! [`FetchResult::success`] and [`FetchResult::error`], which is the shape
//! adapters depend on. [`Fetcher::fetch_text`] exposes the typed error for
//! callers that want it.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::FetchError;
use crate::rate_limit::retry_with_backoff;

pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Per-request timeout overriding the client default.
    pub timeout: Option<Duration>,
    /// Send a desktop-browser `User-Agent` instead of the service one.
    pub use_browser: bool,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub success: bool,
    pub content: String,
    pub error: Option<String>,
}

/// Shared HTTP client with timeout, `User-Agent` and retry policy.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl Fetcher {
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Fetches `url` and reports the outcome without erroring.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult {
        match self.fetch_text(url, options).await {
            Ok(content) => FetchResult {
                success: true,
                content,
                error: None,
            },
            Err(e) => {
                tracing::warn!(url, error = %e, "fetch failed");
                FetchResult {
                    success: false,
                    content: String::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Fetches `url` as text, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`FetchError::RateLimited`]: HTTP 429 after all retries.
    /// - [`FetchError::NotFound`]: HTTP 404 (not retried).
    /// - [`FetchError::UnexpectedStatus`]: other non-2xx statuses (5xx retried).
    /// - [`FetchError::Http`]: network, timeout or body read failure.
    pub async fn fetch_text(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || async move {
            tracing::debug!(url, "fetching page");
            let mut request = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, ACCEPT_HTML)
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.5");
            if options.use_browser {
                request = request.header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT);
            }
            if let Some(timeout) = options.timeout {
                request = request.timeout(timeout);
            }
            for (name, value) in &options.headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(0);
                return Err(FetchError::RateLimited {
                    url: url.to_owned(),
                    retry_after_secs,
                });
            }
            if status == StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound {
                    url: url.to_owned(),
                });
            }
            if !status.is_success() {
                return Err(FetchError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_owned(),
                });
            }

            Ok(response.text().await?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_fetcher(max_retries: u32) -> Fetcher {
        Fetcher::new(5, "couponhub-test/0.1", max_retries, 0).expect("failed to build test Fetcher")
    }

    #[tokio::test]
    async fn fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/promos"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>Use code EATS5</p>"))
            .mount(&server)
            .await;

        let result = test_fetcher(0)
            .fetch(&format!("{}/promos", server.uri()), &FetchOptions::default())
            .await;
        assert!(result.success);
        assert_eq!(result.content, "<p>Use code EATS5</p>");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn fetch_reports_not_found_without_erroring() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result = test_fetcher(3)
            .fetch(&format!("{}/gone", server.uri()), &FetchOptions::default())
            .await;
        assert!(!result.success);
        assert!(result.content.is_empty());
        assert!(result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn fetch_text_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let body = test_fetcher(2)
            .fetch_text(&format!("{}/flaky", server.uri()), &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn fetch_text_maps_rate_limit_with_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let err = test_fetcher(0)
            .fetch_text(&format!("{}/busy", server.uri()), &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::RateLimited {
                retry_after_secs: 7,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn use_browser_sends_browser_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ua"))
            .and(header("user-agent", BROWSER_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("browser"))
            .mount(&server)
            .await;

        let options = FetchOptions {
            use_browser: true,
            ..FetchOptions::default()
        };
        let result = test_fetcher(0)
            .fetch(&format!("{}/ua", server.uri()), &options)
            .await;
        assert!(result.success, "expected browser UA match: {result:?}");
    }
}
