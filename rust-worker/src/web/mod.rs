//! Web server module: the producer-facing HTTP surface.
//!
//! Routes:
//! - `GET  /health`: status and pending queue depth
//! - `POST /queue`: fire-and-forget single enqueue
//! - `POST /send-now`: manual campaign with a structured result
//! - `POST /events/delivery`: provider delivery events (HMAC verified)

pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    delivery_event, enqueue_message, health, send_now, AppState, DeliveryEventPayload,
    DeliveryEventResponse, EnqueueResponse, HealthResponse, SendNowRequest, SendNowResponse,
};
pub use signature::{verification_enabled, verify_event_signature};

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/queue", post(enqueue_message))
        .route("/send-now", post(send_now))
        .route("/events/delivery", post(delivery_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
