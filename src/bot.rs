//! Bot startup
//!
//! Wires the components together and runs both listeners. Every startup step
//! is awaited in order; a failure to authenticate or bind aborts startup.

use crate::channels::{ChannelSender, SlackClient, SlackConfig, SlackEvents};
use crate::completion::{CompletionGateway, RetryPolicy};
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::filter::MessageFilter;
use crate::openai::OpenAiClient;
use crate::router::Router;
use crate::status::{shutdown_signal, StatusServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

/// Capacity of the inbound event queue
const EVENT_QUEUE_CAPACITY: usize = 256;

pub const STARTUP_TEST_MESSAGE: &str = "This is a test message";

/// Build the completion gateway from config
pub fn build_gateway(config: &Config) -> CompletionGateway {
    let policy = RetryPolicy {
        max_attempts: config.completion_max_attempts,
        ..RetryPolicy::default()
    }
    .with_initial_delay(config.completion_retry_delay);

    CompletionGateway::new(Arc::new(OpenAiClient::from_config(config)), policy)
        .with_attempt_timeout(config.completion_timeout)
}

/// Run the bot until shutdown
pub async fn run_bot(config: Config) -> Result<()> {
    tracing::info!("===========================================");
    tracing::info!("  RelayBot - Starting...");
    tracing::info!("===========================================");
    config.log_presence();

    let slack_config = SlackConfig::from_config(&config);
    let slack = Arc::new(SlackClient::from_config(&slack_config));

    let bot_id = match config.bot_member_id.clone() {
        Some(id) => id,
        None => {
            tracing::info!("BOT_MEMBER_ID not set, resolving with auth.test...");
            slack.auth_test().await.context("failed to authenticate Slack bot")?
        }
    };
    tracing::info!("Bot member id: {}", bot_id);
    if config.admin_member_id.is_none() {
        tracing::warn!("MY_MEMBER_ID not set, administrator filtering disabled");
    }

    let store = Arc::new(ConversationStore::new());
    let router = Arc::new(Router::new(
        store,
        MessageFilter::new(Some(bot_id), config.admin_member_id.clone()),
        build_gateway(&config),
        slack.clone(),
    ));

    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let events = SlackEvents::new(&slack_config.signing_secret, event_tx);

    let events_listener = TcpListener::bind(config.events_addr())
        .await
        .with_context(|| format!("failed to bind events listener on {}", config.events_addr()))?;
    tracing::info!("Slack events listener on port {}", config.events_port);

    let status_listener = StatusServer::bind(config.status_addr())
        .await
        .with_context(|| format!("failed to bind status listener on {}", config.status_addr()))?;

    if let Some(channel) = config.test_channel_id.as_deref() {
        match slack.send_text(channel, STARTUP_TEST_MESSAGE).await {
            Ok(ts) => tracing::info!("Message sent: {}", ts),
            Err(e) => tracing::error!("Error sending message: {}", e),
        }
    }

    let worker = tokio::spawn(router.clone().run(event_rx));

    let events_server = async move {
        axum::serve(events_listener, events.router().layer(TraceLayer::new_for_http()))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("events listener failed")
    };
    let status_server = async move {
        StatusServer::new(router)
            .run(status_listener)
            .await
            .context("status listener failed")
    };

    tracing::info!("===========================================");
    tracing::info!("  Bot is now LIVE - send a message!");
    tracing::info!("===========================================");

    tokio::try_join!(events_server, status_server)?;

    // Both servers dropped their queue senders; the worker drains and exits
    worker.await.context("router worker failed")?;
    tracing::warn!("Bot stopped");
    Ok(())
}
