//! Buffered HTTP response model and JSON decoding.
//!
//! [`Response`] is a **fully buffered** response as returned by the engine: the
//! final URL, status code + reason, headers and the raw body bytes. Bodies are
//! read up to the engine's `max_content_length` and rejected beyond it.
//!
//! [`decode`] turns a body into a [`ResponseMapping`], keeping the key order of
//! the document.
use http::HeaderMap;

use crate::errors::FetchError;

/// Ordered mapping of key to decoded JSON value, in document order.
pub type ResponseMapping = serde_json::Map<String, serde_json::Value>;

/// Simple structure for HTTP responses.
///
/// All fields reflect the **received** response as-is.
#[derive(Debug)]
pub struct Response {
    /// Final URL of the response (after redirects, if any).
    pub url: url::Url,

    /// Numeric HTTP status code (e.g., `200`, `404`).
    pub status: u16,

    /// Human-readable reason phrase, `"Unknown"` for non-standard codes.
    pub status_text: String,

    /// Response headers as a case-insensitive map.
    pub headers: HeaderMap,

    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as a JSON object.
    pub fn to_map(&self) -> Result<ResponseMapping, FetchError> {
        decode(&self.body)
    }
}

/// Parses `body` as UTF-8 JSON text whose top level is an object.
///
/// Nested objects and arrays are kept as [`serde_json::Value`]s. There is no
/// partial recovery: any syntax error, invalid UTF-8 or a non-object document
/// fails with [`FetchError::Parse`].
pub fn decode(body: &[u8]) -> Result<ResponseMapping, FetchError> {
    Ok(serde_json::from_slice(body)?)
}

/// Buffers the body of `res`, failing once more than `limit` bytes arrive.
pub(crate) async fn read_response(mut res: reqwest::Response, limit: u64) -> Result<Response, FetchError> {
    if let Some(len) = res.content_length() {
        if len > limit {
            return Err(FetchError::ResponseTooLarge { limit });
        }
    }

    let url = res.url().clone();
    let status = res.status().as_u16();
    let status_text = res.status().canonical_reason().unwrap_or("Unknown").to_string();
    let headers = res.headers().clone();

    // Note: does not deal with streaming
    let mut body = Vec::new();
    while let Some(chunk) = res.chunk().await? {
        if (body.len() + chunk.len()) as u64 > limit {
            return Err(FetchError::ResponseTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(Response {
        url,
        status,
        status_text,
        headers,
        body,
    })
}
