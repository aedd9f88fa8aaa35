//! HTTP client abstraction for testability

use std::time::Duration;

use super::types::ProviderError;
use crate::cache::BoxFuture;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response body as bytes, or an error for transport failures and
    /// any non-2xx status.
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ProviderError>>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the default timeout.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("himawari/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

fn classify(url: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(url.to_string())
    } else {
        ProviderError::Http(format!("Request to {} failed: {}", url, e))
    }
}

impl HttpClient for ReqwestClient {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ProviderError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| classify(url, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ProviderError::Status {
                    code: status.as_u16(),
                    url: url.to_string(),
                });
            }

            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| classify(url, e))
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock HTTP client serving canned responses per URL.
    ///
    /// Unknown URLs answer 404. Every requested URL is recorded.
    #[derive(Default)]
    pub struct MockHttpClient {
        pub responses: HashMap<String, Result<Vec<u8>, ProviderError>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn with(mut self, url: &str, response: Result<Vec<u8>, ProviderError>) -> Self {
            self.responses.insert(url.to_string(), response);
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl HttpClient for MockHttpClient {
        fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ProviderError>> {
            self.requests.lock().unwrap().push(url.to_string());
            let response = self.responses.get(url).cloned().unwrap_or_else(|| {
                Err(ProviderError::Status {
                    code: 404,
                    url: url.to_string(),
                })
            });
            Box::pin(async move { response })
        }
    }

    #[tokio::test]
    async fn test_mock_client_success() {
        let mock = MockHttpClient::default().with("http://example.com/a", Ok(vec![1, 2, 3, 4]));

        let result = mock.get("http://example.com/a").await;
        assert_eq!(result.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(mock.requested(), vec!["http://example.com/a".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_client_unknown_url_is_404() {
        let mock = MockHttpClient::default();

        let result = mock.get("http://example.com/missing").await;
        assert!(matches!(result, Err(ProviderError::Status { code: 404, .. })));
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::with_timeout(Duration::from_secs(5)).is_ok());
    }
}
