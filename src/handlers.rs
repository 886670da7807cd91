//! Axum handlers wiring the translator and the relay together.
use axum::Json;
use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::BytesRejection;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::AppState;
use crate::client::HttpClient;
use crate::errors::RelayError;
use crate::relay::{forward_chat, forward_transcription};
use crate::translate::{self, FilePart, TranscriptionRequest};

/// `POST /api/chat`: validate/normalize the JSON body, forward it, relay
/// the provider's answer.
#[instrument(skip(state, body))]
pub async fn chat_handler<T: HttpClient>(
    State(state): State<AppState<T>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, RelayError> {
    // An over-cap or unreadable body still gets the error envelope, with
    // the extractor's status (413 for the size ceiling) preserved.
    let body = body.map_err(|e| RelayError::Rejected {
        status: e.status(),
        message: e.body_text(),
    })?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| RelayError::Validation("request body must be a JSON object".to_string()))?;

    let payload = translate::translate_chat(payload)?;
    let model = payload
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    info!(model, "forwarding chat request");

    forward_chat(&state.http_client, &state.upstream, &payload).await
}

/// `POST /api/audio/transcriptions`: extract the form (one file part named
/// `file`, arbitrary scalar fields), re-serialize it, forward it.
#[instrument(skip(state, multipart))]
pub async fn transcription_handler<T: HttpClient>(
    State(state): State<AppState<T>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, RelayError> {
    let mut multipart = multipart.map_err(|e| RelayError::Rejected {
        status: e.status(),
        message: e.body_text(),
    })?;

    let mut request = TranscriptionRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(rejected)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("file").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(rejected)?;
            request.file = Some(FilePart {
                filename,
                content_type,
                bytes,
            });
        } else {
            let value = field.text().await.map_err(rejected)?;
            request.fields.push((name, value));
        }
    }

    debug!(
        fields = request.fields.len(),
        has_file = request.file.is_some(),
        "extracted transcription form"
    );

    let form = translate::translate_transcription(request)?;
    info!(size = form.len(), "forwarding transcription request");

    forward_transcription(&state.http_client, &state.upstream, form).await
}

/// Form-stream errors keep their own status (413 once the body cap trips,
/// 400 for a malformed part) but render as the envelope.
fn rejected(e: MultipartError) -> RelayError {
    RelayError::Rejected {
        status: e.status(),
        message: e.body_text(),
    }
}

/// `GET /api/status`: liveness probe.
pub async fn status_handler() -> impl IntoResponse {
    Json(json!({ "status": "Server is running" }))
}
