//! Messaging Channel
//!
//! Slack is the only platform: an Events API receiver for inbound messages
//! and a Web API client for outbound replies.

pub mod slack;
pub mod slack_events;
pub mod traits;

pub use slack::{SlackClient, SlackConfig};
pub use slack_events::SlackEvents;
pub use traits::{ChannelError, ChannelSender, InboundMessage};
