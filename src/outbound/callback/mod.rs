// Callback delivery module
//
// Pure components:
//   retry_policy – backoff curve and attempt budget
//
// Delivery components:
//   http_client – one POST attempt with a fixed timeout
//   dispatcher  – retry loop for a single payload
//   workers     – supervised background execution of dispatches

pub mod dispatcher;
pub mod http_client;
pub mod retry_policy;
pub mod workers;

// Re-export commonly used types
pub use dispatcher::{CallbackDispatcher, DeliveryError, DeliveryReport, Sleeper, TokioSleeper};
pub use http_client::{CallbackHttpClient, CallbackResponse, HttpClientError};
pub use retry_policy::RetryPolicy;
pub use workers::{DeliveryWorkers, ShutdownReport};
