//! Request translation: shaping inbound requests into upstream payloads.
//!
//! Chat bodies are loosely typed: only `messages` (required) and `model`
//! (defaulted) carry any contract, every other field is forwarded opaquely.
//! Transcription forms are re-serialized into a fresh multipart body with
//! the file's declared metadata preserved verbatim.
use axum::body::Bytes;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::RelayError;

/// Model filled in when a chat request omits the `model` field.
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.3-70b-versatile";

/// Validate a chat body and fill in defaults.
///
/// `messages` is required; its absence is a validation failure. A missing
/// `model` is auto-corrected to [`DEFAULT_CHAT_MODEL`] rather than rejected.
pub fn translate_chat(mut body: Value) -> Result<Value, RelayError> {
    let object = body
        .as_object_mut()
        .ok_or_else(|| RelayError::Validation("messages array is required".to_string()))?;

    if !object.contains_key("messages") {
        return Err(RelayError::Validation(
            "messages array is required".to_string(),
        ));
    }

    object
        .entry("model")
        .or_insert_with(|| Value::String(DEFAULT_CHAT_MODEL.to_string()));

    Ok(body)
}

/// One uploaded file: the raw bytes plus the metadata the client declared.
/// The content type is taken as-is, never sniffed or re-derived.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A transcription request after extraction from the inbound form: scalar
/// fields in arrival order, plus the file part when one was supplied.
#[derive(Debug, Default)]
pub struct TranscriptionRequest {
    pub fields: Vec<(String, String)>,
    pub file: Option<FilePart>,
}

/// An outbound `multipart/form-data` body together with its boundary.
#[derive(Debug)]
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    /// Value for the outbound `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Re-serialize an extracted form into an outbound multipart body.
///
/// Fails with "No file provided" when the file part is absent; this happens
/// before any upstream call is attempted. The provider does not care about
/// field order, so scalar fields are written as received, file last.
pub fn translate_transcription(request: TranscriptionRequest) -> Result<MultipartBody, RelayError> {
    let file = request
        .file
        .ok_or_else(|| RelayError::Validation("No file provided".to_string()))?;

    let boundary = format!("groq-relay-{}", Uuid::new_v4().simple());
    let mut body = Vec::with_capacity(file.bytes.len() + 512);

    for (name, value) in &request.fields {
        let name = escape_quoted(name);
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            escape_quoted(&file.filename),
            file.content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(&file.bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Ok(MultipartBody { boundary, body })
}

/// WHATWG `multipart/form-data` escaping for quoted header values: a raw
/// `"` or CR/LF inside a field name or filename would corrupt the part
/// header.
fn escape_quoted(value: &str) -> String {
    value
        .replace('\r', "%0D")
        .replace('\n', "%0A")
        .replace('"', "%22")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn missing_model_gets_the_default() {
        let body = json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "temperature": 0.7
        });

        let translated = translate_chat(body).unwrap();
        assert_eq!(translated["model"], DEFAULT_CHAT_MODEL);
        // Everything else is untouched.
        assert_eq!(translated["temperature"], 0.7);
        assert_eq!(translated["messages"][0]["content"], "Hello");
    }

    #[test]
    fn explicit_model_is_preserved() {
        let body = json!({
            "model": "llama-3.1-8b-instant",
            "messages": [{"role": "user", "content": "Hello"}]
        });

        let translated = translate_chat(body).unwrap();
        assert_eq!(translated["model"], "llama-3.1-8b-instant");
    }

    #[rstest]
    #[case(json!({"model": "llama-3.1-8b-instant"}))]
    #[case(json!({}))]
    #[case(json!([1, 2, 3]))]
    #[case(json!("not an object"))]
    fn bodies_without_messages_are_rejected(#[case] body: Value) {
        let err = translate_chat(body).unwrap_err();
        assert_eq!(err.to_string(), "messages array is required");
    }

    #[test]
    fn missing_file_is_rejected_before_serialization() {
        let request = TranscriptionRequest {
            fields: vec![("model".to_string(), "whisper-large-v3".to_string())],
            file: None,
        };

        let err = translate_transcription(request).unwrap_err();
        assert_eq!(err.to_string(), "No file provided");
    }

    #[test]
    fn multipart_body_carries_fields_and_file_verbatim() {
        let request = TranscriptionRequest {
            fields: vec![
                ("model".to_string(), "whisper-large-v3".to_string()),
                ("language".to_string(), "en".to_string()),
            ],
            file: Some(FilePart {
                filename: "clip.wav".to_string(),
                content_type: "audio/wav".to_string(),
                bytes: Bytes::from_static(b"RIFFdata"),
            }),
        };

        let multipart = translate_transcription(request).unwrap();
        let content_type = multipart.content_type();
        assert!(content_type.starts_with("multipart/form-data; boundary=groq-relay-"));

        let boundary = content_type.split("boundary=").nth(1).unwrap().to_string();
        let body = String::from_utf8(multipart.into_bytes()).unwrap();

        assert!(body.contains(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\nwhisper-large-v3\r\n"
        )));
        assert!(body.contains("name=\"language\"\r\n\r\nen\r\n"));
        assert!(body.contains(
            "name=\"file\"; filename=\"clip.wav\"\r\nContent-Type: audio/wav\r\n\r\nRIFFdata"
        ));
        assert!(body.ends_with(&format!("\r\n--{boundary}--\r\n")));
    }

    #[test]
    fn quotes_and_newlines_in_names_are_escaped_in_part_headers() {
        let request = TranscriptionRequest {
            fields: vec![("na\"me".to_string(), "value".to_string())],
            file: Some(FilePart {
                filename: "evil\"\r\nclip.wav".to_string(),
                content_type: "audio/wav".to_string(),
                bytes: Bytes::from_static(b"x"),
            }),
        };

        let multipart = translate_transcription(request).unwrap();
        let body = String::from_utf8(multipart.into_bytes()).unwrap();

        assert!(body.contains("name=\"na%22me\""));
        assert!(body.contains("filename=\"evil%22%0D%0Aclip.wav\""));
        // No raw quote or CRLF survives inside a disposition header.
        assert!(!body.contains("filename=\"evil\""));
    }

    #[test]
    fn boundaries_are_unique_per_request() {
        let build = || {
            translate_transcription(TranscriptionRequest {
                fields: vec![],
                file: Some(FilePart {
                    filename: "a.ogg".to_string(),
                    content_type: "audio/ogg".to_string(),
                    bytes: Bytes::from_static(b"x"),
                }),
            })
            .unwrap()
            .content_type()
        };

        assert_ne!(build(), build());
    }
}
