//! Relay Integration Tests
//!
//! Signed Slack event in, OpenAI call, Slack reply out, history visible on the
//! status surface. Both external services are mocked over HTTP.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use httpmock::prelude::*;
use relaybot::bot::build_gateway;
use relaybot::channels::slack_events::sign;
use relaybot::completion::COMPLETION_FAILURE_REPLY;
use relaybot::{
    Config, ConversationStore, InboundMessage, MessageFilter, Outcome, Router, SlackClient,
    SlackEvents, StatusServer, Turn,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

const SIGNING_SECRET: &str = "test-signing-secret";

fn test_config(openai_base: &str, slack_base: &str) -> Config {
    let env = HashMap::from([
        ("SLACK_SIGNING_SECRET", SIGNING_SECRET.to_string()),
        ("SLACK_BOT_TOKEN", "xoxb-test".to_string()),
        ("OPENAI_API_KEY", "sk-test".to_string()),
        ("PORT1", "0".to_string()),
        ("PORT2", "0".to_string()),
        ("BOT_MEMBER_ID", "UBOT".to_string()),
        ("MY_MEMBER_ID", "UADMIN".to_string()),
        ("OPENAI_API_BASE", openai_base.to_string()),
        ("SLACK_API_BASE", slack_base.to_string()),
        ("COMPLETION_RETRY_DELAY_MS", "0".to_string()),
    ]);
    Config::from_lookup(|key| env.get(key).cloned()).expect("config")
}

fn build_router(config: &Config) -> Arc<Router> {
    Arc::new(Router::new(
        Arc::new(ConversationStore::new()),
        MessageFilter::new(config.bot_member_id.clone(), config.admin_member_id.clone()),
        build_gateway(config),
        Arc::new(SlackClient::new(&config.slack_api_base, &config.slack_bot_token)),
    ))
}

fn signed_event(event: serde_json::Value) -> Request<Body> {
    let body = json!({"type": "event_callback", "event": event}).to_string();
    let ts = chrono::Utc::now().timestamp().to_string();
    Request::builder()
        .method("POST")
        .uri("/slack/events")
        .header("content-type", "application/json")
        .header("x-slack-request-timestamp", &ts)
        .header(
            "x-slack-signature",
            sign(SIGNING_SECRET, &ts, body.as_bytes()).expect("signature"),
        )
        .body(Body::from(body))
        .expect("request")
}

#[tokio::test]
async fn test_event_is_answered_and_recorded() {
    let openai = MockServer::start();
    let completion = openai.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_includes("\"content\":\"What is Rust?\"");
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": "A systems language."}}]
        }));
    });

    let slack = MockServer::start();
    let reply = slack.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"C1\"")
            .body_includes("Hello <@U1>, A systems language.");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "1.0"}));
    });

    let config = test_config(&openai.base_url(), &slack.base_url());
    let router = build_router(&config);

    let (tx, rx) = mpsc::channel(8);
    let worker = tokio::spawn(router.clone().run(rx));
    let events = SlackEvents::new(&config.slack_signing_secret, tx);

    let response = events
        .router()
        .oneshot(signed_event(json!({
            "type": "message",
            "user": "U1",
            "text": "What is Rust?",
            "channel": "C1",
            "ts": "1700000000.000100"
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    // Closing the queue lets the worker finish the pending event
    drop(events);
    worker.await.expect("worker");

    completion.assert_calls(1);
    reply.assert_calls(1);

    let status = StatusServer::new(router).build_router();
    let response = status
        .oneshot(Request::builder().uri("/debug").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(json, json!({"U1": [{"role": "user", "content": "What is Rust?"}]}));
}

#[tokio::test]
async fn test_outage_replies_with_failure_text_after_three_attempts() {
    let openai = MockServer::start();
    let completion = openai.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(503).body("service unavailable");
    });

    let slack = MockServer::start();
    let reply = slack.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes(COMPLETION_FAILURE_REPLY);
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "1.0"}));
    });

    let config = test_config(&openai.base_url(), &slack.base_url());
    let router = build_router(&config);

    let outcome = router
        .handle_event(&InboundMessage::text("C1", "U1", "hello"))
        .await;

    assert_eq!(outcome, Outcome::Answered);
    completion.assert_calls(3);
    reply.assert_calls(1);
}

#[tokio::test]
async fn test_paused_bot_records_but_does_not_call_openai() {
    let openai = MockServer::start();
    let completion = openai.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200)
            .json_body(json!({"choices": [{"message": {"content": "hi"}}]}));
    });

    let slack = MockServer::start();
    let acks = slack.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "1.0"}));
    });

    let config = test_config(&openai.base_url(), &slack.base_url());
    let router = build_router(&config);

    router.handle_event(&InboundMessage::text("C1", "U1", "@pause")).await;
    let outcome = router
        .handle_event(&InboundMessage::text("C1", "U1", "anyone home?"))
        .await;

    assert_eq!(outcome, Outcome::Recorded);
    assert_eq!(router.store().get("U1"), vec![Turn::user("anyone home?")]);
    completion.assert_calls(0);
    acks.assert_calls(1);
}

#[tokio::test]
async fn test_admin_traffic_is_not_relayed() {
    let openai = MockServer::start();
    let completion = openai.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200)
            .json_body(json!({"choices": [{"message": {"content": "hi"}}]}));
    });
    let slack = MockServer::start();

    let config = test_config(&openai.base_url(), &slack.base_url());
    let router = build_router(&config);

    let outcome = router
        .handle_event(&InboundMessage::text("C1", "UADMIN", "lunch anyone?"))
        .await;
    assert!(matches!(outcome, Outcome::Ignored(_)));

    let outcome = router
        .handle_event(&InboundMessage::text("C1", "U1", "<@UADMIN> quick question"))
        .await;
    assert!(matches!(outcome, Outcome::Ignored(_)));

    completion.assert_calls(0);
    assert_eq!(router.store().participant_count(), 0);
}
