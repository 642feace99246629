//! HTTP surface.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Runs one delivery through the pipeline
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

use axum::http::StatusCode;

pub mod webhook;

pub use webhook::{WebhookAccepted, webhook_handler};

use crate::store::PrStore;
use crate::transport::EventPublisher;
use crate::webhooks::WebhookPipeline;

/// Shared application state, passed to handlers through axum's `State`
/// extractor.
pub struct AppState<S, P> {
    inner: Arc<WebhookPipeline<S, P>>,
}

impl<S, P> Clone for AppState<S, P> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, P> AppState<S, P> {
    pub fn new(pipeline: WebhookPipeline<S, P>) -> Self {
        AppState {
            inner: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &WebhookPipeline<S, P> {
        &self.inner
    }
}

/// Liveness check. Does not check the store or the broker.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Builds the router with every endpoint.
pub fn build_router<S, P>(app_state: AppState<S, P>) -> axum::Router
where
    S: PrStore + 'static,
    P: EventPublisher + 'static,
{
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler::<S, P>))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
