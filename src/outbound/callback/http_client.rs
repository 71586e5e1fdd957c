use reqwest::{Client, Response, StatusCode};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Error type for a single callback request
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Response error: status={status}, body={body}")]
    ResponseError { status: StatusCode, body: String },
}

impl HttpClientError {
    /// HTTP status of a non-2xx response, if the endpoint answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            HttpClientError::ResponseError { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }

    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            HttpClientError::Timeout(timeout)
        } else if err.is_connect() {
            HttpClientError::NetworkError(err.to_string())
        } else {
            HttpClientError::RequestFailed(err.to_string())
        }
    }
}

/// Successful callback response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackResponse {
    pub status_code: u16,
}

/// HTTP client wrapper for callback delivery
#[derive(Debug, Clone)]
pub struct CallbackHttpClient {
    client: Client,
    timeout: Duration,
}

impl CallbackHttpClient {
    /// Create a new HTTP client with the default per-request timeout (10 seconds)
    pub fn new() -> Result<Self, HttpClientError> {
        Self::with_timeout(Duration::from_secs(10))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("SignatureCollector/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpClientError::RequestFailed(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// POST a JSON body once. Any 2xx status is a success.
    pub async fn post_json(
        &self,
        url: &str,
        body: &str,
    ) -> Result<CallbackResponse, HttpClientError> {
        debug!(url = %url, "Sending callback");

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| HttpClientError::from_reqwest(e, self.timeout))?;

        let response_time_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        debug!(
            url = %url,
            status = %status.as_u16(),
            response_time_ms = %response_time_ms,
            "Callback response received"
        );

        if !status.is_success() {
            let body = self.read_response_body(response).await;
            return Err(HttpClientError::ResponseError { status, body });
        }

        Ok(CallbackResponse {
            status_code: status.as_u16(),
        })
    }

    /// Read an error response body, truncated to a small excerpt
    async fn read_response_body(&self, response: Response) -> String {
        const MAX_BODY_SIZE: usize = 1024;

        match response.bytes().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_BODY_SIZE)])
                .to_string(),
            Err(e) => format!("<unreadable body: {e}>"),
        }
    }
}
