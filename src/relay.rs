//! Upstream relay: the outbound exchange with the provider.
//!
//! Each forward is a single linear pass: build the request, wait (bounded),
//! then normalize the outcome into either a verbatim pass-through response
//! or a [`RelayError`]. Nothing is retried and nothing survives the request.
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, Method, Request, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use crate::client::{BoxError, HttpClient};
use crate::config::Config;
use crate::errors::RelayError;
use crate::translate::MultipartBody;

/// Bounded wait for chat completions.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(30);
/// Bounded wait for transcriptions. Longer than chat: audio payloads are
/// larger and the provider's processing is slower.
pub const TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) const CHAT_ERROR_MESSAGE: &str = "An error occurred while processing your request";
pub(crate) const TRANSCRIPTION_ERROR_MESSAGE: &str =
    "An error occurred while processing your transcription request";

/// The fixed provider this relay forwards to.
///
/// Built once at startup from [`Config`]; the credential lives here for the
/// life of the process and is never re-read from the environment.
pub struct Upstream {
    api_key: String,
    chat_url: Url,
    transcription_url: Url,
    pub chat_timeout: Duration,
    pub transcription_timeout: Duration,
}

impl Upstream {
    pub fn new(base_url: &Url, api_key: String) -> Result<Self, anyhow::Error> {
        Ok(Self {
            api_key,
            chat_url: base_url.join("chat/completions")?,
            transcription_url: base_url.join("audio/transcriptions")?,
            chat_timeout: CHAT_TIMEOUT,
            transcription_timeout: TRANSCRIPTION_TIMEOUT,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, anyhow::Error> {
        Self::new(&config.upstream_url, config.api_key.clone())
    }
}

// Manual Debug so the credential never lands in logs.
impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("api_key", &"<redacted>")
            .field("chat_url", &self.chat_url.as_str())
            .field("transcription_url", &self.transcription_url.as_str())
            .field("chat_timeout", &self.chat_timeout)
            .field("transcription_timeout", &self.transcription_timeout)
            .finish()
    }
}

/// Outcome of one upstream exchange, produced once at the relay boundary
/// and consumed once by the response formatter.
#[derive(Debug)]
enum UpstreamResult {
    /// Success-range status: relayed to the caller verbatim.
    Success {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },
    /// Non-success status, with the provider's error body when one could be
    /// read (parsed as JSON if possible, raw text otherwise).
    Failure {
        status: StatusCode,
        body: Option<Value>,
    },
}

/// Forward a translated chat payload to the provider's chat endpoint.
pub async fn forward_chat<T: HttpClient>(
    client: &T,
    upstream: &Upstream,
    payload: &Value,
) -> Result<Response, RelayError> {
    let body = serde_json::to_vec(payload).map_err(|e| RelayError::Network {
        message: CHAT_ERROR_MESSAGE,
        detail: e.to_string(),
    })?;

    let req = build_request(
        &upstream.chat_url,
        &upstream.api_key,
        HeaderValue::from_static("application/json"),
        body,
        CHAT_ERROR_MESSAGE,
    )?;

    debug!(url = %upstream.chat_url, "forwarding chat completion");
    let result = exchange(client, req, upstream.chat_timeout, CHAT_ERROR_MESSAGE).await?;
    into_caller_response(result, CHAT_ERROR_MESSAGE)
}

/// Forward a re-serialized multipart body to the provider's transcription
/// endpoint.
pub async fn forward_transcription<T: HttpClient>(
    client: &T,
    upstream: &Upstream,
    form: MultipartBody,
) -> Result<Response, RelayError> {
    let content_type =
        HeaderValue::from_str(&form.content_type()).map_err(|e| RelayError::Network {
            message: TRANSCRIPTION_ERROR_MESSAGE,
            detail: e.to_string(),
        })?;

    let req = build_request(
        &upstream.transcription_url,
        &upstream.api_key,
        content_type,
        form.into_bytes(),
        TRANSCRIPTION_ERROR_MESSAGE,
    )?;

    debug!(url = %upstream.transcription_url, "forwarding transcription");
    let result = exchange(
        client,
        req,
        upstream.transcription_timeout,
        TRANSCRIPTION_ERROR_MESSAGE,
    )
    .await?;
    into_caller_response(result, TRANSCRIPTION_ERROR_MESSAGE)
}

fn build_request(
    url: &Url,
    api_key: &str,
    content_type: HeaderValue,
    body: Vec<u8>,
    message: &'static str,
) -> Result<Request<Body>, RelayError> {
    let authorization =
        HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| RelayError::Network {
            message,
            detail: e.to_string(),
        })?;

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(url.as_str())
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, body.len())
        .header(header::AUTHORIZATION, authorization);

    // Match the host header to the provider; CDN fronts reject a mismatch.
    if let Some(host) = url.host_str() {
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        builder = builder.header(header::HOST, host);
    }

    builder
        .body(Body::from(body))
        .map_err(|e| RelayError::Network {
            message,
            detail: e.to_string(),
        })
}

/// Perform the exchange under the bounded wait.
///
/// The wait covers both the round trip and draining the response body: if
/// it elapses, the call is abandoned and no partial response is accepted.
async fn exchange<T: HttpClient>(
    client: &T,
    req: Request<Body>,
    wait: Duration,
    message: &'static str,
) -> Result<UpstreamResult, RelayError> {
    let outcome = tokio::time::timeout(wait, async {
        let response = client.request(req).await?;
        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| Box::new(e) as BoxError)?;
        Ok::<_, BoxError>((status, content_type, body))
    })
    .await;

    let (status, content_type, body) = match outcome {
        Ok(Ok(parts)) => parts,
        Ok(Err(e)) => {
            error!("error calling upstream provider: {}", e);
            return Err(RelayError::Network {
                message,
                detail: e.to_string(),
            });
        }
        Err(_) => {
            error!(
                "upstream call abandoned after {}s bounded wait",
                wait.as_secs()
            );
            return Err(RelayError::Network {
                message,
                detail: format!("upstream call timed out after {}s", wait.as_secs()),
            });
        }
    };

    if status.is_success() {
        Ok(UpstreamResult::Success {
            status,
            content_type,
            body,
        })
    } else {
        debug!(status = %status, "upstream returned non-success status");
        let body = if body.is_empty() {
            None
        } else {
            // Keep the provider's error body structured when it is JSON;
            // fall back to its raw text otherwise.
            Some(serde_json::from_slice(&body).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&body).into_owned())
            }))
        };
        Ok(UpstreamResult::Failure { status, body })
    }
}

/// Map the tagged outcome to the caller's response: verbatim on success,
/// envelope (via [`RelayError`]) on failure.
fn into_caller_response(
    result: UpstreamResult,
    message: &'static str,
) -> Result<Response, RelayError> {
    match result {
        UpstreamResult::Success {
            status,
            content_type,
            body,
        } => {
            let mut builder = Response::builder().status(status);
            if let Some(content_type) = content_type {
                builder = builder.header(header::CONTENT_TYPE, content_type);
            }
            builder
                .body(Body::from(body))
                .map_err(|e| RelayError::Network {
                    message,
                    detail: e.to_string(),
                })
        }
        UpstreamResult::Failure { status, body } => Err(RelayError::Upstream {
            status,
            message,
            details: body,
        }),
    }
}
