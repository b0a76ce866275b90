//! Status HTTP Server
//!
//! Axum server for the status routes with request tracing and graceful
//! shutdown.

use crate::router::Router as MessageRouter;
use crate::status::api::{status_router, AppState};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Status server
pub struct StatusServer {
    state: Arc<AppState>,
}

impl StatusServer {
    pub fn new(router: Arc<MessageRouter>) -> Self {
        Self {
            state: Arc::new(AppState::new(router)),
        }
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        status_router(self.state.clone()).layer(TraceLayer::new_for_http())
    }

    /// Bind the listener
    pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
        TcpListener::bind(addr).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("Listening at http://{}", addr);
        }

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Status server shut down gracefully");
        Ok(())
    }
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelError, ChannelSender};
    use crate::completion::{CompletionBackend, CompletionError, CompletionGateway, RetryPolicy};
    use crate::conversation::{ConversationStore, Turn};
    use crate::filter::MessageFilter;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct FixedBackend(Option<&'static str>);

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        async fn complete(&self, _messages: &[Turn]) -> Result<String, CompletionError> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| CompletionError::Transport("unreachable".to_string()))
        }
    }

    struct NullSender;

    #[async_trait]
    impl ChannelSender for NullSender {
        async fn send_text(&self, _channel_id: &str, _text: &str) -> Result<String, ChannelError> {
            Ok("0".to_string())
        }
    }

    fn server(reply: Option<&'static str>) -> (StatusServer, Arc<ConversationStore>) {
        let store = Arc::new(ConversationStore::new());
        let router = Arc::new(MessageRouter::new(
            store.clone(),
            MessageFilter::default(),
            CompletionGateway::new(Arc::new(FixedBackend(reply)), RetryPolicy::immediate(2)),
            Arc::new(NullSender),
        ));
        (StatusServer::new(router), store)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_root_returns_completion() {
        let (server, _) = server(Some("All systems go"));
        let (status, body) = get(server.build_router(), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(String::from_utf8_lossy(&body), "All systems go");
    }

    #[tokio::test]
    async fn test_root_failure_is_500() {
        let (server, _) = server(None);
        let (status, body) = get(server.build_router(), "/").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(String::from_utf8_lossy(&body), "An error occurred");
    }

    #[tokio::test]
    async fn test_debug_dumps_history() {
        let (server, store) = server(Some("ok"));
        store.append("U1", Turn::user("first"));
        store.append("U1", Turn::user("second"));
        store.append("U2", Turn::user("other"));

        for uri in ["/debug", "/userHistory"] {
            let (status, body) = get(server.build_router(), uri).await;
            assert_eq!(status, StatusCode::OK);

            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(
                json,
                serde_json::json!({
                    "U1": [
                        {"role": "user", "content": "first"},
                        {"role": "user", "content": "second"}
                    ],
                    "U2": [{"role": "user", "content": "other"}]
                })
            );
        }
    }

    #[tokio::test]
    async fn test_debug_empty_store() {
        let (server, _) = server(Some("ok"));
        let (status, body) = get(server.build_router(), "/debug").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"{}");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, store) = server(Some("ok"));
        store.append("U1", Turn::user("hi"));

        let (status, body) = get(server.build_router(), "/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["participants"], 1);
        assert_eq!(json["turns"], 1);
        assert_eq!(json["paused"], false);
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_liveness_endpoint() {
        let (server, _) = server(Some("ok"));
        let (status, _) = get(server.build_router(), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
    }
}
