//! Admission protocol types.
//!
//! Everything here lives for a single inbound request; nothing is shared
//! across evaluations.

use std::fmt;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Deserializer};

use crate::admission::error::GateError;

/// Prefix of every admission query path.
pub const QUEUES_PREFIX: &str = "/queues/";

/// Suffix asking the admission service to start a waiting room for the host.
pub const ENABLE_SUFFIX: &str = "/enable";

/// Read-only view of the inbound request, as far as the gate cares.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// Normalized virtual host (no port, lowercase).
    pub host: String,
    /// `Cookie` header values, forwarded to the admission service.
    pub cookies: Vec<HeaderValue>,
    /// Correlation id of the inbound request, if any.
    pub request_id: Option<String>,
}

impl InboundRequest {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_cookie(mut self, cookie: HeaderValue) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Path queried on the admission service: `/queues/{host}[/enable]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionQueryTarget(String);

impl AdmissionQueryTarget {
    /// Build the query path for `host`.
    ///
    /// Rejects hosts that are empty or would change the shape of the path.
    pub fn new(host: &str, enable: bool) -> Result<Self, GateError> {
        if host.is_empty() {
            return Err(GateError::MissingHost);
        }
        if host
            .chars()
            .any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace() || c.is_control())
        {
            return Err(GateError::InvalidHost(host.to_string()));
        }

        let mut path = String::with_capacity(QUEUES_PREFIX.len() + host.len() + ENABLE_SUFFIX.len());
        path.push_str(QUEUES_PREFIX);
        path.push_str(host);
        if enable {
            path.push_str(ENABLE_SUFFIX);
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_enable(&self) -> bool {
        self.0.ends_with(ENABLE_SUFFIX)
    }
}

impl fmt::Display for AdmissionQueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of the admission sub-request.
#[derive(Debug, Clone)]
pub struct AdmissionResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl AdmissionResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: axum::http::HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A queue number as returned by the admission service.
///
/// Services disagree on whether these are JSON numbers or strings; both are
/// accepted and rendered back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum QueueNumber {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for QueueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueNumber::Number(n) => write!(f, "{}", n),
            QueueNumber::Text(s) => f.write_str(s),
        }
    }
}

/// Queue position metadata carried by a 429 admission response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThrottleInfo {
    /// The caller's position in the queue.
    pub serial_no: QueueNumber,
    /// The highest position currently let through.
    pub permitted_no: QueueNumber,
    /// Estimated seconds until the caller is admitted.
    #[serde(default, deserialize_with = "optional_queue_number")]
    pub remaining_wait_second: Option<QueueNumber>,
}

/// Advisory fields of an unusable type are dropped instead of failing the body.
fn optional_queue_number<'de, D>(deserializer: D) -> Result<Option<QueueNumber>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(QueueNumber::deserialize(value).ok())
}

impl ThrottleInfo {
    pub fn from_body(body: &[u8]) -> Result<Self, GateError> {
        serde_json::from_slice(body).map_err(GateError::MalformedThrottleBody)
    }
}

/// Classification of an admission response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 200: the caller may proceed.
    Admitted,
    /// 429: the caller must wait.
    Throttled,
    /// Anything else.
    Unclassified(StatusCode),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Admitted => "admitted",
            Outcome::Throttled => "throttled",
            Outcome::Unclassified(_) => "unclassified",
        }
    }
}

/// What the host proxy must do with the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Proceed to the origin; `headers` go onto the eventual response.
    Continue { headers: HeaderMap },
    /// Answer immediately with `status` and `headers`, skipping the origin.
    Block { status: StatusCode, headers: HeaderMap },
}

impl Disposition {
    pub fn is_continue(&self) -> bool {
        matches!(self, Disposition::Continue { .. })
    }

    pub fn headers(&self) -> &HeaderMap {
        match self {
            Disposition::Continue { headers } | Disposition::Block { headers, .. } => headers,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Disposition::Continue { .. } => None,
            Disposition::Block { status, .. } => Some(*status),
        }
    }
}
