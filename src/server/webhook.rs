//! `POST /webhook`.
//!
//! The request body is the provider's payload, taken as text. Processing is
//! synchronous: the response is sent only after every stage has run (or one
//! has failed), so the status code tells the provider whether to redeliver.
//!
//! | Outcome | Status |
//! |---------|--------|
//! | processed | 200 OK |
//! | not a pull request event | 400 Bad Request |
//! | store failure | 500 Internal Server Error |
//! | broker failure | 503 Service Unavailable |
//!
//! Error bodies are fixed strings. The failing stage and its cause are only
//! logged.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, warn};

use super::AppState;
use crate::store::PrStore;
use crate::transport::EventPublisher;
use crate::types::{ArchiveRecordId, PrRecordId};
use crate::webhooks::{PipelineError, Processed};

const REJECTED_BODY: &str = "invalid webhook payload";
const FAILED_BODY: &str = "webhook processing failed";

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            PipelineError::Extraction(_) => (StatusCode::BAD_REQUEST, REJECTED_BODY),
            PipelineError::Archive(_) | PipelineError::Reconcile(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, FAILED_BODY)
            }
            PipelineError::Notify(_) => (StatusCode::SERVICE_UNAVAILABLE, FAILED_BODY),
        };
        warn!(status = status.as_u16(), error = %self, "Webhook not processed");
        (status, body).into_response()
    }
}

/// Body of a 200 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAccepted {
    pub archive_id: ArchiveRecordId,
    pub record_id: PrRecordId,
    pub inserted: bool,
    pub sequence: u64,
}

impl From<&Processed> for WebhookAccepted {
    fn from(processed: &Processed) -> Self {
        WebhookAccepted {
            archive_id: processed.archive_id,
            record_id: processed.record.id,
            inserted: processed.inserted(),
            sequence: processed.receipt.sequence,
        }
    }
}

pub async fn webhook_handler<S, P>(
    State(app_state): State<AppState<S, P>>,
    body: Bytes,
) -> Result<Json<WebhookAccepted>, PipelineError>
where
    S: PrStore + 'static,
    P: EventPublisher + 'static,
{
    // The archive must see every delivery, so a body that is not UTF-8 is
    // archived lossily rather than refused.
    let payload = String::from_utf8_lossy(&body);
    if let std::borrow::Cow::Owned(_) = payload {
        warn!(bytes = body.len(), "Webhook body is not valid UTF-8");
    }

    debug!(bytes = body.len(), "Received webhook");
    let processed = app_state.pipeline().handle_webhook_event(&payload).await?;
    Ok(Json(WebhookAccepted::from(&processed)))
}
