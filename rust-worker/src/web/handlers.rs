//! Producer-facing HTTP handlers.
//!
//! These endpoints are the interface boundary to the collaborators that
//! produce messages and configuration: enqueue (fire-and-forget), the
//! manual send action (the one synchronous, caller-visible error path)
//! and the provider delivery-event webhook that feeds the reputation
//! tracker for transports with deferred confirmation.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::activity::{ActivityLog, EventKind};
use crate::config::Config;
use crate::producer::{self, EnqueueError};
use crate::queue::{NewMessage, QueueStore};
use crate::reputation::ReputationTracker;
use crate::web::signature::{verification_enabled, verify_event_signature};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool) -> Self {
        Self {
            config: Arc::new(config),
            pool,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub pending: i64,
}

/// Health check endpoint with queue depth.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let pending = QueueStore::new(state.pool.clone())
        .pending_count(Utc::now().timestamp())
        .await
        .unwrap_or(-1);

    Json(HealthResponse {
        status: "ok",
        pending,
    })
}

// =============================================================================
// Enqueue
// =============================================================================

/// Response for the fire-and-forget enqueue endpoint.
#[derive(Serialize)]
pub struct EnqueueResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// Enqueue a single message.
///
/// Fire-and-forget: the message is accepted as supplied and validated at
/// dispatch time; invalid recipients are dropped by the tick, observable
/// only through the activity log.
pub async fn enqueue_message(
    State(state): State<AppState>,
    Json(message): Json<NewMessage>,
) -> impl IntoResponse {
    let now = Utc::now().timestamp();

    info!(
        recipient = %message.recipient,
        subject = %message.subject,
        has_headers = !message.headers.is_empty(),
        "enqueue_received"
    );

    match QueueStore::new(state.pool.clone()).enqueue(&message, now).await {
        Ok(id) => (
            StatusCode::OK,
            Json(EnqueueResponse {
                status: "queued",
                id: Some(id),
            }),
        ),
        Err(e) => {
            error!(error = %e, "enqueue_failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(EnqueueResponse {
                    status: "error",
                    id: None,
                }),
            )
        }
    }
}

// =============================================================================
// Manual Send
// =============================================================================

/// Manual send request: one rendered message, many recipients.
#[derive(Debug, Deserialize)]
pub struct SendNowRequest {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
    /// Optional dedup key; a repeated key is rejected
    #[serde(default)]
    pub campaign_key: Option<String>,
}

/// Structured result reported back to the invoker.
#[derive(Serialize)]
pub struct SendNowResponse {
    pub success: bool,
    pub message: String,
    pub queued: u32,
}

/// Manual "send now" action.
pub async fn send_now(
    State(state): State<AppState>,
    Json(request): Json<SendNowRequest>,
) -> impl IntoResponse {
    let now = Utc::now().timestamp();

    info!(
        recipients = request.recipients.len(),
        campaign_key = request.campaign_key.as_deref().unwrap_or("-"),
        "send_now_received"
    );

    let result = producer::queue_campaign(
        &state.pool,
        &request.subject,
        &request.body,
        &request.recipients,
        request.campaign_key.as_deref(),
        EventKind::ManualSendQueued,
        None,
        now,
    )
    .await;

    match result {
        Ok(outcome) => (
            StatusCode::OK,
            Json(SendNowResponse {
                success: true,
                message: outcome.message,
                queued: outcome.queued,
            }),
        ),
        Err(e) => {
            let status = match &e {
                EnqueueError::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                EnqueueError::NoRecipients => StatusCode::UNPROCESSABLE_ENTITY,
                EnqueueError::DuplicateCampaign(_) => StatusCode::CONFLICT,
                EnqueueError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(error = %e, "send_now_rejected");
            (
                status,
                Json(SendNowResponse {
                    success: false,
                    message: e.to_string(),
                    queued: 0,
                }),
            )
        }
    }
}

// =============================================================================
// Delivery Events
// =============================================================================

/// Provider delivery event payload.
#[derive(Debug, Deserialize)]
pub struct DeliveryEventPayload {
    /// "delivered" or "failed"
    pub event: String,
    pub recipient: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub signature: String,
}

/// Delivery event response.
#[derive(Serialize)]
pub struct DeliveryEventResponse {
    pub status: &'static str,
}

/// Provider delivery event webhook.
///
/// Lets transports with deferred confirmation update the reputation
/// counters after the synchronous accept.
pub async fn delivery_event(
    State(state): State<AppState>,
    Json(payload): Json<DeliveryEventPayload>,
) -> impl IntoResponse {
    if verification_enabled(state.config.event_signing_key.as_deref()) {
        let key = state.config.event_signing_key.as_deref().unwrap_or_default();
        if !verify_event_signature(
            key,
            &payload.timestamp,
            &payload.token,
            &payload.signature,
            state.config.event_signature_max_age,
        ) {
            warn!(recipient = %payload.recipient, "delivery_event_signature_invalid");
            return (
                StatusCode::UNAUTHORIZED,
                Json(DeliveryEventResponse {
                    status: "unauthorized",
                }),
            );
        }
    }

    let now = Utc::now().timestamp();
    let reputation = ReputationTracker::new(state.pool.clone());
    let activity = ActivityLog::new(state.pool.clone());

    let result = match payload.event.as_str() {
        "delivered" => reputation.record_success(now).await,
        "failed" => {
            let reason = payload.reason.as_deref().unwrap_or("provider reported failure");
            reputation.record_failure(now, reason).await
        }
        other => {
            warn!(event = other, "delivery_event_unknown_kind");
            return (
                StatusCode::BAD_REQUEST,
                Json(DeliveryEventResponse { status: "ignored" }),
            );
        }
    };

    if let Err(e) = result {
        error!(error = %e, "delivery_event_update_failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(DeliveryEventResponse { status: "error" }),
        );
    }

    let detail = format!(
        "Provider event: {}{}",
        payload.event,
        payload
            .reason
            .as_deref()
            .map(|r| format!(" ({})", r))
            .unwrap_or_default()
    );
    if let Err(e) = activity
        .record(&payload.recipient, EventKind::DeliveryEvent, &detail, now)
        .await
    {
        error!(error = %e, "delivery_event_log_failed");
    }

    info!(
        recipient = %payload.recipient,
        event = %payload.event,
        "delivery_event_recorded"
    );

    (
        StatusCode::OK,
        Json(DeliveryEventResponse { status: "recorded" }),
    )
}
