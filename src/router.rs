//! Message Router
//!
//! Per-event state machine: filter, record, complete, reply.
//!
//! ```text
//! received ──► filtered ──┬──► ignored
//!                         ├──► welcomed
//!                         └──► recorded ──┬──► (paused) stop
//!                                         └──► answered
//! ```
//!
//! Pause/resume commands are matched before the filter and short-circuit
//! everything else. The router owns the pause flag and shares the
//! conversation store with the status surface.

use crate::channels::{ChannelSender, InboundMessage};
use crate::completion::CompletionGateway;
use crate::conversation::{ConversationStore, Turn};
use crate::filter::{mention, FilterDecision, MessageFilter};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub const PAUSE_TOKEN: &str = "@pause";
pub const RESUME_TOKEN: &str = "@resume";

pub const PAUSED_ACK: &str = "The bot is now paused.";
pub const RESUMED_ACK: &str = "The bot is now resumed.";

static PAUSE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(&regex::escape(PAUSE_TOKEN)).unwrap());
static RESUME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(&regex::escape(RESUME_TOKEN)).unwrap());

/// Administrative command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
}

impl Command {
    /// Match a command anywhere in the text; pause wins over resume
    pub fn parse(text: &str) -> Option<Self> {
        if PAUSE_PATTERN.is_match(text) {
            Some(Self::Pause)
        } else if RESUME_PATTERN.is_match(text) {
            Some(Self::Resume)
        } else {
            None
        }
    }
}

/// What happened to one inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Filtered out, no side effects
    Ignored(&'static str),
    /// Greeting sent
    Welcomed,
    /// Pause command applied
    Paused,
    /// Resume command applied
    Resumed,
    /// Recorded in history but not answered (bot paused)
    Recorded,
    /// Reply sent
    Answered,
    /// Handling failed; logged and dropped
    Dropped,
}

/// Welcome text for a new participant
pub fn welcome_text(user_id: &str) -> String {
    format!(
        "Welcome {}! Feel free to ask if you have any questions or need assistance.",
        mention(user_id)
    )
}

/// Reply text addressing the sender
pub fn reply_text(user_id: &str, reply: &str) -> String {
    format!("Hello {}, {}", mention(user_id), reply)
}

/// Message router
pub struct Router {
    store: Arc<ConversationStore>,
    filter: MessageFilter,
    gateway: CompletionGateway,
    sender: Arc<dyn ChannelSender>,
    paused: AtomicBool,
}

impl Router {
    pub fn new(
        store: Arc<ConversationStore>,
        filter: MessageFilter,
        gateway: CompletionGateway,
        sender: Arc<dyn ChannelSender>,
    ) -> Self {
        Self {
            store,
            filter,
            gateway,
            sender,
            paused: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn gateway(&self) -> &CompletionGateway {
        &self.gateway
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Handle one inbound event. Never fails; errors are logged and the
    /// event is dropped.
    pub async fn handle_event(&self, message: &InboundMessage) -> Outcome {
        info!(
            ">>> Message received: user={}, channel={}, text={:?}",
            message.sender_id,
            message.channel_id,
            message.text_or_empty().chars().take(50).collect::<String>()
        );

        match self.try_handle(message).await {
            Ok(outcome) => {
                debug!("Event outcome for {}: {:?}", message.sender_id, outcome);
                outcome
            }
            Err(e) => {
                error!("Error handling message from {}: {:#}", message.sender_id, e);
                Outcome::Dropped
            }
        }
    }

    async fn try_handle(&self, message: &InboundMessage) -> Result<Outcome> {
        let text = message.text_or_empty();

        if !text.is_empty() && !self.filter.is_self(message) {
            if let Some(command) = Command::parse(text) {
                return self.apply_command(command, message).await;
            }
        }

        let classification = self.filter.classify(message);
        match classification.decision {
            FilterDecision::Ignore => {
                debug!("Skipping message from {}: {}", message.sender_id, classification.reason);
                return Ok(Outcome::Ignored(classification.reason));
            }
            FilterDecision::Welcome => {
                info!("Welcoming {}", message.sender_id);
                self.sender
                    .send_text(&message.channel_id, &welcome_text(&message.sender_id))
                    .await?;
                return Ok(Outcome::Welcomed);
            }
            FilterDecision::Process => {}
        }

        self.store.append(&message.sender_id, Turn::user(text));
        info!("User {} sent message: {}", message.sender_id, text);

        if self.is_paused() {
            debug!("Bot paused; not answering {}", message.sender_id);
            return Ok(Outcome::Recorded);
        }

        let reply = self.gateway.complete(text).await;
        self.sender
            .send_text(&message.channel_id, &reply_text(&message.sender_id, &reply))
            .await?;

        Ok(Outcome::Answered)
    }

    async fn apply_command(&self, command: Command, message: &InboundMessage) -> Result<Outcome> {
        let (paused, ack, outcome) = match command {
            Command::Pause => (true, PAUSED_ACK, Outcome::Paused),
            Command::Resume => (false, RESUMED_ACK, Outcome::Resumed),
        };

        self.paused.store(paused, Ordering::SeqCst);
        info!("{:?} command from {}", command, message.sender_id);

        self.sender.send_text(&message.channel_id, ack).await?;
        Ok(outcome)
    }

    /// Drain the event queue, handling one event at a time
    ///
    /// Each event runs in its own task so a panic while handling it is
    /// contained and the worker keeps serving subsequent events.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<InboundMessage>) {
        info!("Router worker started");

        while let Some(message) = events.recv().await {
            let router = self.clone();
            let handled = tokio::spawn(async move { router.handle_event(&message).await }).await;

            if let Err(e) = handled {
                error!("Event handler panicked: {}", e);
            }
        }

        warn!("Router worker stopped: event queue closed");
    }
}
