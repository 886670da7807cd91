//! groq-relay - a minimal HTTP relay in front of the Groq API
//!
//! Accepts chat-completion JSON payloads and multipart audio uploads,
//! forwards them (after default-filling and header translation) to the
//! fixed upstream provider, and relays the provider's response or error
//! back to the caller. Each request is independent and stateless.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tracing::{info, instrument};

pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod relay;
pub mod translate;

use client::{HttpClient, HyperClient};
use handlers::{chat_handler, status_handler, transcription_handler};
use relay::Upstream;

/// Ceiling for inbound JSON bodies. Requests beyond it are rejected before
/// translation.
const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Ceiling for inbound multipart bodies. The provider caps audio files at
/// 25 MiB, so accepting more would only waste memory.
const AUDIO_BODY_LIMIT: usize = 25 * 1024 * 1024;

/// The state shared by all handlers: the outbound HTTP client and the
/// upstream description (credential, endpoint URLs, bounded waits). Both
/// are read-only after startup.
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub upstream: Arc<Upstream>,
}

impl AppState<HyperClient> {
    /// Create a new AppState with the default hyper client
    pub fn new(upstream: Upstream) -> Self {
        Self {
            http_client: client::create_hyper_client(client::PoolSettings::default()),
            upstream: Arc::new(upstream),
        }
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing)
    pub fn with_client(upstream: Upstream, http_client: T) -> Self {
        Self {
            http_client,
            upstream: Arc::new(upstream),
        }
    }
}

/// Build the relay's router:
/// - `POST /api/chat` - chat completions
/// - `POST /api/audio/transcriptions` - audio uploads
/// - `GET /api/status` - liveness probe (the one canonical status path)
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    Router::new()
        .route(
            "/api/chat",
            post(chat_handler).layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
        )
        .route(
            "/api/audio/transcriptions",
            post(transcription_handler).layer(DefaultBodyLimit::max(AUDIO_BODY_LIMIT)),
        )
        .route("/api/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Test support: a scriptable [`HttpClient`] that records every outbound
/// request. Used by both the unit tests and the integration tests.
#[doc(hidden)]
pub mod test_utils {
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::{Arc, Mutex};

    use crate::client::{BoxError, HttpClient};

    #[derive(Clone)]
    enum MockBehavior {
        Respond { status: StatusCode, body: String },
        /// Never resolves; exercises the bounded wait.
        Hang,
    }

    #[derive(Clone)]
    pub struct MockHttpClient {
        requests: Arc<Mutex<Vec<MockRequest>>>,
        behavior: MockBehavior,
    }

    #[derive(Debug, Clone)]
    pub struct MockRequest {
        pub method: String,
        pub uri: String,
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    impl MockRequest {
        pub fn header(&self, name: &str) -> Option<String> {
            self.headers
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        }

        pub fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).unwrap()
        }
    }

    impl MockHttpClient {
        pub fn new(status: StatusCode, body: &str) -> Self {
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                behavior: MockBehavior::Respond {
                    status,
                    body: body.to_string(),
                },
            }
        }

        pub fn new_hanging() -> Self {
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                behavior: MockBehavior::Hang,
            }
        }

        pub fn get_requests(&self) -> Vec<MockRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl std::fmt::Debug for MockHttpClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockHttpClient")
                .field("requests", &self.requests)
                .finish()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn request(
            &self,
            req: axum::extract::Request,
        ) -> Result<axum::response::Response, BoxError> {
            let method = req.method().to_string();
            let uri = req.uri().to_string();
            let headers = req
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect();

            let body = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .map_err(|e| Box::new(e) as BoxError)?
                .to_vec();

            self.requests.lock().unwrap().push(MockRequest {
                method,
                uri,
                headers,
                body,
            });

            match &self.behavior {
                MockBehavior::Respond { status, body } => {
                    Ok(axum::response::Response::builder()
                        .status(*status)
                        .header("content-type", "application/json")
                        .body(axum::body::Body::from(body.clone()))
                        .unwrap())
                }
                MockBehavior::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!("pending future resolved")
                }
            }
        }
    }
}
