//! Response status mapping and decoding.

use crate::error::{ClientError, HttpError, HttpErrorKind, Result};
use crate::request::OutputMode;
use crate::stream::{decode_whole, ChunkStream, EncodingResolver, LineStream};
use bytes::Bytes;
use reqwest::Response;

/// Pass successful responses through; map `[400, 600)` to [`HttpError`].
///
/// The reason phrase is extended with Space-Track's own message: the `error`
/// field of a JSON body, or else the raw body text when it is non-empty.
pub async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if !(400..600).contains(&status.as_u16()) {
        return Ok(response);
    }

    let headers = response.headers().clone();
    let url = response.url().clone();
    let body = response.bytes().await.unwrap_or_default();
    let message = service_message(&body);

    let mut reason = status.canonical_reason().unwrap_or("Unknown").to_string();
    if let Some(ref message) = message {
        reason.push_str("\nSpace-Track response:\n");
        reason.push_str(message);
    }

    tracing::warn!(
        url = %url,
        status = %status.as_u16(),
        error = ?message,
        "Request failed"
    );

    Err(HttpError {
        kind: HttpErrorKind::from_status(status),
        status,
        reason,
        message,
        headers,
    }
    .into())
}

fn service_message(body: &[u8]) -> Option<String> {
    let from_json = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| match value.get("error")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        })
        .filter(|s| !s.is_empty());

    from_json.or_else(|| {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    })
}

/// Result of a query, shaped by its [`OutputMode`].
#[derive(Debug)]
pub enum QueryResponse {
    /// Parsed JSON body
    Json(serde_json::Value),
    /// Raw text body with `\r\n` normalized to `\n`
    Text(String),
    /// Raw body of a binary class
    Bytes(Bytes),
    /// Line-by-line stream
    Lines(LineStream),
    /// Fixed-size chunk stream
    Chunks(ChunkStream),
}

impl QueryResponse {
    pub fn into_json(self) -> Result<serde_json::Value> {
        match self {
            QueryResponse::Json(value) => Ok(value),
            other => Err(other.mismatch("JSON")),
        }
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            QueryResponse::Text(text) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn into_bytes(self) -> Result<Bytes> {
        match self {
            QueryResponse::Bytes(bytes) => Ok(bytes),
            QueryResponse::Text(text) => Ok(Bytes::from(text)),
            other => Err(other.mismatch("bytes")),
        }
    }

    pub fn into_lines(self) -> Result<LineStream> {
        match self {
            QueryResponse::Lines(lines) => Ok(lines),
            other => Err(other.mismatch("line stream")),
        }
    }

    pub fn into_chunks(self) -> Result<ChunkStream> {
        match self {
            QueryResponse::Chunks(chunks) => Ok(chunks),
            other => Err(other.mismatch("chunk stream")),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            QueryResponse::Json(_) => "JSON",
            QueryResponse::Text(_) => "text",
            QueryResponse::Bytes(_) => "bytes",
            QueryResponse::Lines(_) => "line stream",
            QueryResponse::Chunks(_) => "chunk stream",
        }
    }

    fn mismatch(&self, wanted: &str) -> ClientError {
        ClientError::InvalidResponse(format!("Expected {} response, got {}", wanted, self.kind()))
    }
}

/// Decode a successful response according to `mode`.
pub(crate) async fn decode_response(
    response: Response,
    mode: OutputMode,
    decode: bool,
    chunk_size: usize,
) -> Result<QueryResponse> {
    match mode {
        OutputMode::Lines => Ok(QueryResponse::Lines(LineStream::from_response(response))),
        OutputMode::Chunks => Ok(QueryResponse::Chunks(ChunkStream::from_response(
            response, chunk_size, decode,
        ))),
        OutputMode::Raw if decode => {
            let encoding = EncodingResolver::resolve(response.headers());
            let body = response.bytes().await?;
            let text = decode_whole(encoding, &body)?;
            Ok(QueryResponse::Text(normalize_newlines(&text)))
        }
        OutputMode::Raw => Ok(QueryResponse::Bytes(response.bytes().await?)),
        OutputMode::Parsed => {
            let body = response.bytes().await?;
            Ok(QueryResponse::Json(parse_json(&body)?))
        }
    }
}

/// Parse a JSON body, logging it when it does not parse.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(
            error = %e,
            body = %String::from_utf8_lossy(body),
            "Response is not valid JSON"
        );
        ClientError::Serialization(e)
    })
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_message_from_json() {
        assert_eq!(
            service_message(br#"{"error": "class not found"}"#),
            Some("class not found".to_string())
        );
    }

    #[test]
    fn test_service_message_falls_back_to_text() {
        assert_eq!(
            service_message(b"You've violated your query rate limit."),
            Some("You've violated your query rate limit.".to_string())
        );
        // JSON without an error field is reported verbatim
        assert_eq!(
            service_message(br#"{"detail": "x"}"#),
            Some(r#"{"detail": "x"}"#.to_string())
        );
    }

    #[test]
    fn test_service_message_empty_body() {
        assert_eq!(service_message(b""), None);
        assert_eq!(service_message(b"  \n"), None);
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\r\nb\r\n"), "a\nb\n");
        assert_eq!(normalize_newlines("a\nb"), "a\nb");
    }

    #[test]
    fn test_parse_json_error_is_serialization() {
        let err = parse_json::<serde_json::Value>(b"not json").unwrap_err();
        assert!(matches!(err, ClientError::Serialization(_)));

        let value: serde_json::Value = parse_json(b"[1]").unwrap();
        assert_eq!(value, serde_json::json!([1]));
    }

    #[test]
    fn test_response_accessors() {
        let text = QueryResponse::Text("x".to_string());
        assert_eq!(text.into_text().unwrap(), "x");

        let json = QueryResponse::Json(serde_json::json!([1]));
        let err = json.into_text().unwrap_err();
        assert!(err.to_string().contains("Expected text response, got JSON"));

        let bytes = QueryResponse::Text("abc".to_string()).into_bytes().unwrap();
        assert_eq!(&bytes[..], b"abc");
    }
}
