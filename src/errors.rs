//! Error taxonomy for the relay.
//!
//! Every failure renders as the caller-facing envelope
//! `{"error": {"message": ..., "details": ...}}`, so clients can always
//! branch on `error.message`. `details` carries the provider's own error
//! body (or a transport diagnostic) when one exists.
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Failures that can occur while translating or forwarding a single request.
///
/// Configuration problems (a missing credential) are not represented here:
/// they are fatal at startup and never reach a request handler.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The inbound request is malformed. Reported as 400 and never
    /// forwarded upstream.
    #[error("{0}")]
    Validation(String),

    /// The inbound body was refused before translation: over the size
    /// ceiling, or an unreadable stream. Keeps the extractor's status.
    #[error("{message}")]
    Rejected {
        status: StatusCode,
        message: String,
    },

    /// The provider answered with a non-success status.
    #[error("upstream returned {status}")]
    Upstream {
        status: StatusCode,
        message: &'static str,
        details: Option<Value>,
    },

    /// The provider could not be reached, or the bounded wait elapsed.
    /// There is no provider status to propagate, so this is always a 500.
    #[error("{message}: {detail}")]
    Network {
        message: &'static str,
        detail: String,
    },
}

/// The caller-facing error shape.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorEnvelope {
    fn new(message: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                details,
            },
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        debug!("responding with error: {}", self);
        let (status, envelope) = match self {
            RelayError::Validation(message) => {
                (StatusCode::BAD_REQUEST, ErrorEnvelope::new(message, None))
            }
            RelayError::Rejected { status, message } => {
                (status, ErrorEnvelope::new(message, None))
            }
            RelayError::Upstream {
                status,
                message,
                details,
            } => (status, ErrorEnvelope::new(message, details)),
            RelayError::Network { message, detail } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorEnvelope::new(message, Some(Value::String(detail))),
            ),
        };
        (status, Json(envelope)).into_response()
    }
}
