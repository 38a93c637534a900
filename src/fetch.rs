use futures::future::BoxFuture;
use reqwest::header::{ACCEPT, CACHE_CONTROL, PRAGMA};
use serde_json::Value;
use std::error::Error as _;
use std::time::Duration;
use tracing::debug;

use crate::error::DashboardError;

/// Outcome classification for a single failed GET. Every kind is retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("Failed to reach backend: {message}")]
    NetworkError { message: String },

    #[error("Request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("API responded with status {status_code}: {status_text}")]
    HttpError { status_code: u16, status_text: String },

    #[error("Malformed JSON response: {message}")]
    DecodeError { message: String },
}

impl FetchFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchFailure::NetworkError { .. } => "network_error",
            FetchFailure::Timeout { .. } => "timeout",
            FetchFailure::HttpError { .. } => "http_error",
            FetchFailure::DecodeError { .. } => "decode_error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchFailure::HttpError { status_code: 404, .. })
    }
}

/// Transport seam between data sources and the network.
pub trait Fetch: Send + Sync {
    fn get_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, FetchFailure>>;
}

/// Issues uncached JSON GETs bounded by a fixed timeout. Never retries.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, DashboardError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self::with_client(client, timeout))
    }

    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute(&self, url: &str) -> Result<Value, FetchFailure> {
        debug!("GET {}", url);
        // The budget covers connect, headers and body, not just the connect phase.
        match tokio::time::timeout(self.timeout, self.exchange(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchFailure::Timeout {
                after: self.timeout,
            }),
        }
    }

    async fn exchange(&self, url: &str) -> Result<Value, FetchFailure> {
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::HttpError {
                status_code: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        serde_json::from_slice(&body).map_err(|e| FetchFailure::DecodeError {
            message: e.to_string(),
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchFailure {
        if err.is_timeout() {
            return FetchFailure::Timeout {
                after: self.timeout,
            };
        }
        FetchFailure::NetworkError {
            message: error_chain(&err),
        }
    }
}

impl Fetch for HttpFetcher {
    fn get_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, FetchFailure>> {
        Box::pin(self.execute(url))
    }
}

/// reqwest's top-level message hides the cause ("connection refused" etc.).
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_message() {
        let failure = FetchFailure::HttpError {
            status_code: 500,
            status_text: "Internal Server Error".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "API responded with status 500: Internal Server Error"
        );
        assert_eq!(failure.kind(), "http_error");
        assert!(!failure.is_not_found());
    }

    #[test]
    fn test_timeout_message_uses_millis() {
        let failure = FetchFailure::Timeout {
            after: Duration::from_millis(5000),
        };
        assert_eq!(failure.to_string(), "Request timed out after 5000ms");
    }

    #[test]
    fn test_not_found_detection() {
        let failure = FetchFailure::HttpError {
            status_code: 404,
            status_text: "Not Found".to_string(),
        };
        assert!(failure.is_not_found());
    }
}
