//! Slack Events API Receiver
//!
//! Verifies request signatures, answers the `url_verification` handshake and
//! queues `message` events for the router. Events are acknowledged before
//! they are processed; Slack redeliveries are not deduplicated.

use super::traits::{ChannelError, InboundMessage};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Maximum age of a signed request
const MAX_SIGNATURE_AGE_SECS: u64 = 60 * 5;

const SIGNATURE_HEADER: &str = "x-slack-signature";
const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const RETRY_HEADER: &str = "x-slack-retry-num";

/// Verify a Slack request signature (`v0=` HMAC-SHA256 of `v0:{ts}:{body}`)
pub fn verify_signature(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> Result<(), ChannelError> {
    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| ChannelError::InvalidSignature("malformed timestamp".to_string()))?;
    if now.abs_diff(sent_at) > MAX_SIGNATURE_AGE_SECS {
        return Err(ChannelError::InvalidSignature("stale timestamp".to_string()));
    }

    let digest_hex = signature
        .strip_prefix("v0=")
        .ok_or_else(|| ChannelError::InvalidSignature("expected v0=<hex>".to_string()))?;
    let expected = hex::decode(digest_hex)
        .map_err(|_| ChannelError::InvalidSignature("digest is not hex".to_string()))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes())
        .map_err(|e| ChannelError::InvalidSignature(e.to_string()))?;
    mac.update(b"v0:");
    mac.update(timestamp.trim().as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| ChannelError::InvalidSignature("signature mismatch".to_string()))
}

/// Compute the `v0=` signature for a request
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> Result<String, ChannelError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes())
        .map_err(|e| ChannelError::InvalidSignature(e.to_string()))?;
    mac.update(format!("v0:{}:", timestamp).as_bytes());
    mac.update(body);
    Ok(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

/// Events API envelope
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    UrlVerification { challenge: String },
    EventCallback { event: SlackEvent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct SlackEvent {
    #[serde(rename = "type")]
    kind: String,
    user: Option<String>,
    text: Option<String>,
    channel: Option<String>,
    subtype: Option<String>,
    ts: Option<String>,
}

impl SlackEvent {
    /// Normalize a `message` event; other event types yield `None`
    ///
    /// Integration posts carrying only a `bot_id` have no member id to filter
    /// on and are dropped.
    fn into_inbound(self) -> Option<InboundMessage> {
        if self.kind != "message" {
            return None;
        }
        let channel_id = self.channel?;
        let sender_id = self.user?;
        Some(InboundMessage {
            channel_id,
            sender_id,
            text: self.text,
            subtype: self.subtype,
            ts: self.ts,
        })
    }
}

struct EventsState {
    signing_secret: String,
    queue: mpsc::Sender<InboundMessage>,
}

/// Slack Events API receiver
pub struct SlackEvents {
    state: Arc<EventsState>,
}

impl SlackEvents {
    pub fn new(signing_secret: &str, queue: mpsc::Sender<InboundMessage>) -> Self {
        Self {
            state: Arc::new(EventsState {
                signing_secret: signing_secret.to_string(),
                queue,
            }),
        }
    }

    /// Router serving `POST /slack/events`
    pub fn router(&self) -> Router {
        Router::new()
            .route("/slack/events", post(events_handler))
            .with_state(self.state.clone())
    }
}

async fn events_handler(
    State(state): State<Arc<EventsState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("");

    if let Err(e) = verify_signature(
        &state.signing_secret,
        header(TIMESTAMP_HEADER),
        &body,
        header(SIGNATURE_HEADER),
        chrono::Utc::now().timestamp(),
    ) {
        warn!("Rejected Slack request: {}", e);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Malformed Slack payload: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        Envelope::UrlVerification { challenge } => {
            info!("Answering Slack url_verification");
            Json(json!({ "challenge": challenge })).into_response()
        }
        Envelope::EventCallback { event } => {
            let retry = header(RETRY_HEADER);
            if !retry.is_empty() {
                // Redeliveries are processed again
                warn!("Slack redelivery (retry {})", retry);
            }

            match event.into_inbound() {
                Some(message) => {
                    debug!(
                        "Queueing message from {} in {}",
                        message.sender_id, message.channel_id
                    );
                    if let Err(e) = state.queue.try_send(message) {
                        warn!("Dropping Slack event: {}", e);
                    }
                }
                None => debug!("Ignoring non-message Slack event"),
            }
            StatusCode::OK.into_response()
        }
        Envelope::Other => StatusCode::OK.into_response(),
    }
}
