//! Route handlers and the JSON error envelope.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::automation::scheduler::DailySweepSummary;
use crate::automation::writer::ManualMessage;
use crate::delivery::processor::QueueSweepSummary;
use crate::reconcile::{MessageEvent, StatusEvent};
use crate::{AppError, Result};

use super::AppState;

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            Self::Config(_) | Self::Db(_) | Self::Gateway(_) | Self::Io(_) => {
                error!(err = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_owned(),
                )
            }
        };
        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Acknowledgement for the message webhook.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageAck {
    /// Always `true` on the success path.
    pub success: bool,
    /// What the reconciler did with the event.
    pub message: String,
}

/// Bare success acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    /// Always `true` on the success path.
    pub success: bool,
}

/// Body of the enqueue action.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    /// Owning tenant.
    #[serde(default)]
    pub property_id: String,
    /// Destination number.
    #[serde(default)]
    pub to: String,
    /// Final message text.
    #[serde(default)]
    pub body: String,
    /// Earliest send time; "now" when omitted.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Attempt cap; configured default when omitted.
    pub max_retries: Option<u32>,
}

/// Response of the enqueue action.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    /// Id of the new job.
    pub job_id: String,
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// `POST /webhook/whatsapp`
pub async fn message_webhook(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<MessageEvent>, JsonRejection>,
) -> Result<Json<MessageAck>> {
    let event = json_body(payload)?;
    let outcome = state.reconciler.record_message(event, Utc::now()).await?;
    Ok(Json(MessageAck {
        success: true,
        message: outcome.describe().to_owned(),
    }))
}

/// `POST /webhook/whatsapp/status`
pub async fn status_webhook(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<StatusEvent>, JsonRejection>,
) -> Result<Json<Ack>> {
    let event = json_body(payload)?;
    state.reconciler.apply_status(event).await?;
    Ok(Json(Ack { success: true }))
}

/// `POST /cron/automations`
pub async fn run_automations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DailySweepSummary>> {
    Ok(Json(state.scheduler.run_sweep(Utc::now()).await?))
}

/// `POST /cron/queue`
pub async fn run_queue(State(state): State<Arc<AppState>>) -> Result<Json<QueueSweepSummary>> {
    Ok(Json(state.processor.run_sweep(Utc::now()).await?))
}

/// `POST /api/queue`
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<EnqueueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EnqueueResponse>)> {
    let request = json_body(payload)?;
    let job_id = state
        .writer
        .enqueue(
            ManualMessage {
                property_id: request.property_id,
                to: request.to,
                body: request.body,
                scheduled_for: request.scheduled_for,
                max_attempts: request.max_retries,
            },
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(EnqueueResponse { job_id })))
}

/// `POST /api/queue/{id}/retry`
pub async fn retry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Ack>> {
    state.processor.retry_failed(&id, Utc::now()).await?;
    Ok(Json(Ack { success: true }))
}
