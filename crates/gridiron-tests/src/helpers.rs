//! Test helper functions and utilities.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use gridiron_api::{AppState, DatasetService, create_router};
use gridiron_cache::{CacheConfig, ResponseCache};
use gridiron_core::ports::SourceReader;
use std::sync::Arc;
use tower::ServiceExt;

/// Largest response body the helpers will buffer.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build the API router over `source` with a fresh cache.
pub fn test_app(source: Arc<dyn SourceReader>, cache: CacheConfig) -> anyhow::Result<(Router, Arc<AppState>)> {
    let cache = Arc::new(ResponseCache::new(cache)?);
    let state = Arc::new(AppState::new(cache, DatasetService::new(source)));
    Ok((create_router(Arc::clone(&state)), state))
}

/// Response captured from a single router call.
pub struct TestResponse {
    pub status: StatusCode,
    pub request_id: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Send one request through the router without binding a socket.
pub async fn send(app: &Router, method: Method, uri: &str) -> anyhow::Result<TestResponse> {
    let request = Request::builder().method(method).uri(uri).body(Body::empty())?;
    let response = app.clone().oneshot(request).await?;

    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = to_bytes(response.into_body(), MAX_BODY_BYTES).await?.to_vec();

    Ok(TestResponse {
        status,
        request_id,
        body,
    })
}

pub async fn get(app: &Router, uri: &str) -> anyhow::Result<TestResponse> {
    send(app, Method::GET, uri).await
}

pub async fn post(app: &Router, uri: &str) -> anyhow::Result<TestResponse> {
    send(app, Method::POST, uri).await
}

/// Wait for a condition with timeout.
pub async fn wait_for<F, Fut>(
    timeout: std::time::Duration,
    interval: std::time::Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_immediate() {
        let result = wait_for(
            std::time::Duration::from_secs(1),
            std::time::Duration::from_millis(10),
            || async { true },
        )
        .await;
        assert!(result);
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let result = wait_for(
            std::time::Duration::from_millis(100),
            std::time::Duration::from_millis(10),
            || async { false },
        )
        .await;
        assert!(!result);
    }
}
