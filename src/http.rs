use std::time::Duration;

use reqwest::{
    StatusCode, Url,
    header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;

use crate::{
    REQUEST_ID_HEADER,
    errors::{Error, Result, UpstreamError},
};

/// Per-call overrides for dispatched requests.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub headers: HeaderList,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderEntry::new(key.into(), value.into()));
        self
    }

    /// Override the overall request timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Structured header list with validation.
#[derive(Clone, Debug, Default)]
pub struct HeaderList(Vec<HeaderEntry>);

impl HeaderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a header entry. Panics if key or value is empty/whitespace-only.
    ///
    /// # Panics
    /// Panics if the header key or value is empty or contains only whitespace.
    pub fn push(&mut self, entry: HeaderEntry) {
        assert!(
            entry.is_valid(),
            "Invalid header: key and value must be non-empty (got key={:?}, value={:?})",
            entry.key,
            entry.value
        );
        self.0.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: String, value: String) -> Self {
        Self { key, value }
    }

    pub fn is_valid(&self) -> bool {
        !(self.key.trim().is_empty() || self.value.trim().is_empty())
    }
}

/// Convert caller headers into a map that replaces same-named defaults.
///
/// `Authorization` is owned by the client and silently dropped here.
pub(crate) fn header_map(headers: &HeaderList) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for entry in headers.iter() {
        if !entry.is_valid() {
            continue;
        }
        let name = HeaderName::from_bytes(entry.key.trim().as_bytes())
            .map_err(|err| Error::Config(format!("invalid header name: {err}")))?;
        if name == AUTHORIZATION {
            #[cfg(feature = "tracing")]
            tracing::warn!("ignoring caller-supplied Authorization header");
            continue;
        }
        let val = HeaderValue::from_str(entry.value.trim())
            .map_err(|err| Error::Config(format!("invalid header value: {err}")))?;
        map.insert(name, val);
    }
    Ok(map)
}

/// Join an API path onto the backend URL, keeping any path prefix the backend URL carries.
pub(crate) fn endpoint_url(backend_url: &str, path: &str) -> Result<Url> {
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{backend_url}/{path}"))
        .map_err(|err| Error::Config(format!("invalid request url: {err}")))
}

pub(crate) fn request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Decode the body of a dispatched call, mapping non-success statuses to [`UpstreamError`].
pub(crate) fn decode_json_body(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Result<Value> {
    if !status.is_success() {
        let text = String::from_utf8_lossy(body).into_owned();
        return Err(parse_upstream_error(status, headers, text).into());
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(Error::Serialization)
}

pub(crate) fn parse_upstream_error(
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
) -> UpstreamError {
    let mut err = UpstreamError::new(status.as_u16(), "");
    err.message = err.status_text.clone();
    err.request_id = request_id_from_headers(headers);

    if body.trim().is_empty() {
        return err;
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(value) => {
            if let Some(message) = error_message(&value) {
                err.message = message;
            }
            if let Some(req_id) = value
                .get("request_id")
                .or_else(|| value.get("requestId"))
                .or_else(|| value.get("traceId"))
                .and_then(|v| v.as_str())
            {
                err.request_id = Some(req_id.to_string());
            }
        }
        Err(_) => err.message = body.clone(),
    }
    err.raw_body = Some(body);
    err
}

/// Pull a human readable message out of the common error envelopes the backend emits.
fn error_message(value: &Value) -> Option<String> {
    let text = |v: Option<&Value>| {
        v.and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
    };
    text(value.get("message"))
        .or_else(|| text(value.get("error").and_then(|e| e.get("message"))))
        .or_else(|| text(value.get("error")))
        .or_else(|| text(value.get("detail")))
        .or_else(|| text(value.get("title")))
}
