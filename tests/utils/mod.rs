#![allow(dead_code)]

use std::time::Duration;

use serde_json::{Value, json};
use signature_collector::{config::Config, server::Server};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wiremock::{MockServer, Request};

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<color_eyre::Result<()>>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Trigger graceful shutdown and wait for the server task to finish.
    pub async fn stop(mut self) -> color_eyre::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.expect("Server task panicked")
    }

    /// Registers a signature request and returns its id.
    pub async fn create_request(&self, body: &Value) -> String {
        let response = self
            .client
            .post(self.url("/api/documents/signatures/request"))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.expect("Invalid JSON response");
        body["request_id"]
            .as_str()
            .expect("Missing request_id")
            .to_string()
    }
}

/// Config for tests: ephemeral port and a short retry budget.
pub fn test_config() -> Config {
    let mut config = Config::load().unwrap();
    config.server.host = "localhost".to_string();
    config.server.port = 0;
    config.callback.max_attempts = 3;
    config.callback.base_delay_ms = 10;
    config.callback.max_delay_ms = 50;
    config.callback.request_timeout_secs = 2;
    config.callback.shutdown_grace_secs = 5;
    config
}

pub async fn spawn_server() -> String {
    let config = test_config();
    let server = Server::new(&config).await.unwrap();

    let port = server.port();
    tokio::spawn(server.run());

    format!("http://{}:{}", config.server.host, port)
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let server = Server::new(&config).await.unwrap();
    let port = server.port();

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));

    TestApp {
        address: format!("http://{}:{}", config.server.host, port),
        client: reqwest::Client::new(),
        shutdown: Some(tx),
        handle,
    }
}

/// A document with a text section, a mandatory `terms` consent and an
/// optional `marketing` consent.
pub fn document_body(callback_url: &str) -> Value {
    json!({
        "document_title": "Employment contract",
        "document_content": [
            {"id": "s1", "type": "text", "content": "https://docs.example.com/contract.pdf"},
            {
                "id": "s2",
                "type": "consent",
                "content": "I accept the terms",
                "consent_type": "terms",
                "consent_mandatory": true
            },
            {
                "id": "s3",
                "type": "consent",
                "content": "Send me offers",
                "consent_type": "marketing",
                "consent_mandatory": false
            }
        ],
        "signer_name": "Ada Lovelace",
        "signer_email": "ada@example.com",
        "device_id": "device-1",
        "callback_url": callback_url
    })
}

/// Polls the mock until it has seen `expected` requests or the deadline passes.
pub async fn wait_for_requests(server: &MockServer, expected: usize) -> Vec<Request> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= expected || tokio::time::Instant::now() >= deadline {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
