use crate::domain::models::CallbackPayload;
use crate::outbound::callback::http_client::{CallbackHttpClient, HttpClientError};
use crate::outbound::callback::retry_policy::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Suspends the delivery task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Outcome of a successful delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Number of attempts made, including the successful one.
    pub attempts: u32,
    pub status_code: u16,
}

/// Terminal delivery failure
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("no callback URL provided")]
    NoCallbackUrl,

    #[error("Failed to serialise callback payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Only the error of the final attempt is kept.
    #[error("failed after {attempts} attempt(s). Last error: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: HttpClientError,
    },
}

/// Delivers one callback payload with bounded retry and exponential backoff.
///
/// Attempts for one payload are strictly sequential. Every failed attempt,
/// including the last one, is followed by a backoff sleep of
/// [`RetryPolicy::delay`] for that attempt's zero-based index. The
/// dispatcher holds no per-delivery state, so one instance can serve any
/// number of concurrent deliveries.
#[derive(Clone)]
pub struct CallbackDispatcher {
    /// HTTP client reused across all requests.
    http_client: CallbackHttpClient,

    /// Retry configuration applied to every delivery.
    policy: RetryPolicy,

    sleeper: Arc<dyn Sleeper>,
}

impl CallbackDispatcher {
    pub fn new(http_client: CallbackHttpClient, policy: RetryPolicy) -> Self {
        Self {
            http_client,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Override how backoff waits are performed.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// POST `payload` to `url` until it is acknowledged or attempts run out.
    ///
    /// An empty `url` fails immediately without touching the network.
    pub async fn deliver(
        &self,
        url: &str,
        payload: &CallbackPayload,
    ) -> Result<DeliveryReport, DeliveryError> {
        if url.is_empty() {
            return Err(DeliveryError::NoCallbackUrl);
        }

        let body = payload.to_json()?;
        let request_id = payload.request_id.as_str();
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            debug!(request_id = %request_id, attempt = attempt, "Sending callback");

            match self.http_client.post_json(url, &body).await {
                Ok(response) => {
                    return Ok(DeliveryReport {
                        attempts: attempt + 1,
                        status_code: response.status_code,
                    });
                }
                Err(e) => {
                    let backoff = self.policy.delay(attempt);
                    attempt += 1;

                    warn!(
                        request_id = %request_id,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        status_code = ?e.status_code(),
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Callback attempt failed"
                    );

                    self.sleeper.sleep(backoff).await;

                    if attempt >= max_attempts {
                        return Err(DeliveryError::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ConsentAnswer, DocumentStatus};
    use std::sync::Mutex;
    use time::macros::datetime;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn payload() -> CallbackPayload {
        let at = datetime!(2024-01-01 12:00 UTC);
        CallbackPayload {
            request_id: "123".to_string(),
            status: DocumentStatus::Completed,
            signer_name: "John Doe".to_string(),
            signer_email: "john@example.com".to_string(),
            signature_data: "signature123".to_string(),
            consents: vec![ConsentAnswer::new("marketing", true, at)],
            completed_at: at,
        }
    }

    fn dispatcher(max_attempts: u32, sleeper: Arc<RecordingSleeper>) -> CallbackDispatcher {
        let policy = RetryPolicy::new(
            max_attempts,
            Duration::from_millis(10),
            Duration::from_millis(100),
        );
        CallbackDispatcher::new(CallbackHttpClient::new().unwrap(), policy).with_sleeper(sleeper)
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt_without_sleeping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/callback"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(payload()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let report = dispatcher(3, sleeper.clone())
            .deliver(&format!("{}/callback", server.uri()), &payload())
            .await
            .unwrap();

        assert_eq!(
            report,
            DeliveryReport {
                attempts: 1,
                status_code: 200
            }
        );
        assert!(sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_exhausts_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let err = dispatcher(3, sleeper.clone())
            .deliver(&server.uri(), &payload())
            .await
            .expect_err("always-500 endpoint must exhaust");

        match err {
            DeliveryError::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error.status_code(), Some(500));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sleeper.sleeps(), vec![ms(10), ms(20), ms(40)]);
    }

    #[tokio::test]
    async fn test_eventual_success_after_one_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let report = dispatcher(3, sleeper.clone())
            .deliver(&server.uri(), &payload())
            .await
            .unwrap();

        assert_eq!(report.attempts, 2);
        assert_eq!(sleeper.sleeps(), vec![ms(10)]);
    }

    #[tokio::test]
    async fn test_last_error_is_from_final_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let err = dispatcher(2, sleeper)
            .deliver(&server.uri(), &payload())
            .await
            .expect_err("must exhaust");

        assert!(matches!(
            err,
            DeliveryError::Exhausted { ref last_error, .. } if last_error.status_code() == Some(404)
        ));
        assert!(err.to_string().contains("failed after 2 attempt(s)"));
    }

    #[tokio::test]
    async fn test_empty_url_fails_without_network_or_sleep() {
        let sleeper = Arc::new(RecordingSleeper::default());

        let err = dispatcher(3, sleeper.clone())
            .deliver("", &payload())
            .await
            .expect_err("empty URL must fail");

        assert!(matches!(err, DeliveryError::NoCallbackUrl));
        assert_eq!(err.to_string(), "no callback URL provided");
        assert!(sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let sleeper = Arc::new(RecordingSleeper::default());

        // Nothing listening here
        let err = dispatcher(2, sleeper.clone())
            .deliver("http://127.0.0.1:9/callback", &payload())
            .await
            .expect_err("closed port must exhaust");

        assert!(matches!(
            err,
            DeliveryError::Exhausted { attempts: 2, ref last_error } if last_error.status_code().is_none()
        ));
        assert_eq!(sleeper.sleeps().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_waits_for_duration() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
