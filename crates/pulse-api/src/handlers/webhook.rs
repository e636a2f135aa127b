//! GitHub webhook receiver.
//!
//! Verifies the delivery signature when a secret is configured, parses the
//! body, and hands the event to the dispatcher. The sender only ever learns
//! whether processing succeeded; error details stay in the logs.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use pulse_core::{EventType, PulseError};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    crypto::{verify_signature, SIGNATURE_HEADER},
    AppState,
};

/// Header naming the GitHub event type.
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying GitHub's unique delivery id.
pub const DELIVERY_HEADER: &str = "x-github-delivery";

const PROCESSED_MESSAGE: &str = "Webhook data processed and stored";
const FAILED_MESSAGE: &str = "Error processing webhook";
const INVALID_SIGNATURE_MESSAGE: &str = "Invalid webhook signature";

/// Body of every webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Outcome in words.
    pub message: &'static str,
}

/// Receives one GitHub webhook delivery.
///
/// Returns:
/// - 200 when processing completed, whether or not anything was written
/// - 401 when a secret is configured and the signature is missing or wrong
/// - 500 for malformed JSON, upstream failures and store failures
#[instrument(
    name = "github_webhook",
    skip(state, headers, body),
    fields(
        event = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()).unwrap_or("none"),
        delivery = headers.get(DELIVERY_HEADER).and_then(|v| v.to_str().ok()).unwrap_or("unknown"),
        body_len = body.len(),
    )
)]
pub async fn receive_github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(&body, signature, secret) {
            return error_response(&PulseError::from(e));
        }
        debug!("Webhook signature verified");
    }

    match process(&state, &headers, &body).await {
        Ok(()) => (StatusCode::OK, Json(WebhookResponse { message: PROCESSED_MESSAGE })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn process(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), PulseError> {
    let payload: Value = serde_json::from_slice(body)?;
    let event =
        EventType::parse(headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()).unwrap_or(""));

    let outcome = state.dispatcher.dispatch(&event, &payload).await?;

    info!(event = %event, outcome = %outcome, "Webhook processed");
    Ok(())
}

fn error_response(err: &PulseError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let message = if err.is_client_error() {
        warn!(code = err.code(), error = %err, "Webhook rejected");
        INVALID_SIGNATURE_MESSAGE
    } else {
        error!(code = err.code(), error = %err, "Error processing webhook");
        FAILED_MESSAGE
    };

    (status, Json(WebhookResponse { message })).into_response()
}
