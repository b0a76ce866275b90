//! RelayBot
//!
//! Slack bot that relays channel messages to an OpenAI-compatible completion
//! API and posts the answers back.
//!
//! # Architecture
//!
//! ```text
//! Slack ──► Events API (PORT1) ──► queue ──► Router ──► Filter
//!                                              │
//!                                              ├── ConversationStore
//!                                              ├── CompletionGateway ──► OpenAI
//!                                              └── SlackClient (chat.postMessage)
//!
//! Status (PORT2) ──► /, /debug, /userHistory, /health ──► Router (read-only)
//! ```

pub mod bot;
pub mod channels;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod filter;
pub mod openai;
pub mod router;
pub mod status;

pub use channels::{ChannelError, ChannelSender, InboundMessage, SlackClient, SlackEvents};
pub use completion::{CompletionBackend, CompletionError, CompletionGateway, RetryPolicy};
pub use config::{Config, ConfigError};
pub use conversation::{ConversationSnapshot, ConversationStore, Role, Turn};
pub use filter::{FilterDecision, MessageFilter};
pub use openai::OpenAiClient;
pub use router::{Outcome, Router};
pub use status::StatusServer;
