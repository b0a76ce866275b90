//! Channel Trait Definitions
//!
//! The narrow contract between the router and the messaging platform.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error types for channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Platform API error in {method}: {error}")]
    Api { method: String, error: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request signature: {0}")]
    InvalidSignature(String),
}

/// Inbound message event, normalized from the platform payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Conversation the message was posted in (replies go here)
    pub channel_id: String,

    /// Participant who sent it
    pub sender_id: String,

    /// Message text, absent for some system events
    pub text: Option<String>,

    /// Platform subtype (e.g. `channel_join`)
    pub subtype: Option<String>,

    /// Platform message timestamp
    pub ts: Option<String>,
}

impl InboundMessage {
    /// Create a plain text message
    pub fn text(channel_id: &str, sender_id: &str, text: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            sender_id: sender_id.to_string(),
            text: Some(text.to_string()),
            subtype: None,
            ts: None,
        }
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = Some(subtype.to_string());
        self
    }

    /// Text or empty string
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Outbound send capability
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Post `text` into `channel_id`, returning the platform message id
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<String, ChannelError>;
}
