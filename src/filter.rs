//! Message Filter
//!
//! Decides whether an inbound message should be ignored, welcomed, or
//! processed. Pure decision logic: no I/O, no shared state.

use crate::channels::InboundMessage;

/// Subtypes Slack uses for "participant joined / was added" notices
const JOIN_SUBTYPES: &[&str] = &["channel_join", "channel_add", "group_join"];

/// Filter verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Drop without side effects
    Ignore,
    /// Greet the sender, nothing else
    Welcome,
    /// Record and answer
    Process,
}

/// Verdict plus the rule that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub decision: FilterDecision,
    pub reason: &'static str,
}

impl Classification {
    fn new(decision: FilterDecision, reason: &'static str) -> Self {
        Self { decision, reason }
    }
}

/// Identity-aware message filter
///
/// Either id may be unknown; rules that reference an unknown id never match.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    bot_id: Option<String>,
    admin_id: Option<String>,
}

impl MessageFilter {
    pub fn new(bot_id: Option<String>, admin_id: Option<String>) -> Self {
        Self {
            bot_id: bot_id.filter(|id| !id.trim().is_empty()),
            admin_id: admin_id.filter(|id| !id.trim().is_empty()),
        }
    }

    pub fn admin_id(&self) -> Option<&str> {
        self.admin_id.as_deref()
    }

    /// Is this message from the bot itself?
    pub fn is_self(&self, message: &InboundMessage) -> bool {
        self.bot_id.as_deref() == Some(message.sender_id.as_str())
    }

    /// Classify a message. First matching rule wins.
    pub fn classify(&self, message: &InboundMessage) -> Classification {
        let text = match message.text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => return Classification::new(FilterDecision::Ignore, "empty text"),
        };

        if self.is_self(message) {
            return Classification::new(FilterDecision::Ignore, "sent by the bot");
        }

        // Joins are welcomed before any administrator rule applies
        if message
            .subtype
            .as_deref()
            .is_some_and(|subtype| JOIN_SUBTYPES.contains(&subtype))
        {
            return Classification::new(FilterDecision::Welcome, "participant joined");
        }

        if let Some(admin) = self.admin_id.as_deref() {
            if mentions(text, admin) {
                return Classification::new(FilterDecision::Ignore, "addressed to the administrator");
            }

            if message.sender_id == admin {
                let addressed_to_bot = self
                    .bot_id
                    .as_deref()
                    .is_some_and(|bot| mentions(text, bot));
                if !addressed_to_bot {
                    return Classification::new(
                        FilterDecision::Ignore,
                        "administrator chatter without bot mention",
                    );
                }
            }
        }

        Classification::new(FilterDecision::Process, "eligible query")
    }
}

/// Slack mention markup for a user id
pub fn mention(user_id: &str) -> String {
    format!("<@{}>", user_id)
}

fn mentions(text: &str, user_id: &str) -> bool {
    text.contains(&mention(user_id))
}
