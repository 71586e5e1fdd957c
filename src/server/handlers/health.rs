use axum::http::StatusCode;

/// Liveness probe; answers with an empty 200.
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
