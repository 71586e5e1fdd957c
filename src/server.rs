mod handlers;
mod responses;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::domain::completion::CompletionService;
use crate::domain::ports::{Clock, DocumentStore, SystemClock};
use crate::infrastructure::store::InMemoryDocumentStore;
use crate::outbound::callback::{CallbackDispatcher, CallbackHttpClient, DeliveryWorkers};
use crate::server::handlers::documents::{complete_signature, list_documents, show_document};
use crate::server::handlers::health::health_check;
use crate::server::handlers::signatures::{
    create_signature_request, delete_signature_request, signature_status,
};
use axum::http::Method;
use axum::{
    Router,
    routing::{delete, get, post},
};
use color_eyre::eyre::{Context, Result};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use responses::{ApiError, ErrorBody};

#[derive(Clone)]
/// The global application state shared between all request handlers.
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub completion: Arc<CompletionService>,
    pub clock: Arc<dyn Clock>,
}

pub struct Server {
    router: Router,
    listener: TcpListener,
    port: u16,
    workers: Arc<DeliveryWorkers>,
}

impl Server {
    /// Creates a new HTTP server and starts the callback delivery workers.
    pub async fn new(config: &Config) -> Result<Self> {
        let trace_layer =
            TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("request", method = %request.method(), uri)
            });

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::DELETE,
                Method::OPTIONS,
            ]);

        let http_client = CallbackHttpClient::with_timeout(config.callback.request_timeout())
            .wrap_err("Failed to build the callback HTTP client")?;
        let dispatcher = CallbackDispatcher::new(http_client, config.callback.retry_policy());
        let workers = Arc::new(DeliveryWorkers::start(
            dispatcher,
            config.callback.shutdown_grace(),
        ));

        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let completion = Arc::new(CompletionService::new(
            store.clone(),
            workers.clone(),
            clock.clone(),
        ));

        let state = AppState {
            store,
            completion,
            clock,
        };

        let router = Router::new()
            .route("/health", get(health_check))
            .route(
                "/api/documents/signatures/request",
                post(create_signature_request),
            )
            .route(
                "/api/documents/signatures/{request_id}/status",
                get(signature_status),
            )
            .route(
                "/api/documents/signatures/{request_id}",
                delete(delete_signature_request),
            )
            .route("/documents/{device_id}", get(list_documents))
            .route(
                "/documents/sign/{request_id}",
                get(show_document).post(complete_signature),
            )
            .layer(cors_layer)
            .layer(trace_layer)
            .with_state(state);

        let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
            .await
            .wrap_err_with(|| format!("Failed to bind to port {}", config.server.port))?;
        let port = listener
            .local_addr()
            .wrap_err("Failed to read the bound address")?
            .port();

        Ok(Self {
            router,
            listener,
            port,
            workers,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Runs the HTTP server until a shutdown signal arrives, then drains the
    /// callback workers.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs the HTTP server until `signal` resolves, then drains the callback
    /// workers.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Server listening on {}", self.listener.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await
            .wrap_err("HTTP server error")?;

        tracing::info!("HTTP server stopped, draining callback deliveries");
        let report = self.workers.shutdown().await;
        tracing::info!(
            drained = report.drained,
            abandoned = report.abandoned,
            "Callback workers stopped"
        );

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
