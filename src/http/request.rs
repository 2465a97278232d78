//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Extract the virtual host the admission queue is keyed on
//! - Build the gate's view of an inbound request
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Host comes from the URI authority (HTTP/2), then the Host header
//! - Host is lowercased and stripped of its port

use axum::http::{
    header::{COOKIE, HOST},
    HeaderValue, Request,
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::admission::InboundRequest;

/// Correlation header, set on every request and echoed on every response.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request's correlation ID, if one was assigned.
pub fn request_id<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
}

/// Normalized virtual host of `request`.
pub fn request_host<B>(request: &Request<B>) -> Option<String> {
    let raw = match request.uri().host() {
        Some(host) => host,
        None => request.headers().get(HOST)?.to_str().ok()?,
    };
    let host = normalize_host(raw);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Lowercase `raw` and drop any `:port` suffix.
pub fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    let host = if raw.starts_with('[') {
        // IPv6 literal, keep the brackets.
        match raw.find(']') {
            Some(end) => &raw[..=end],
            None => raw,
        }
    } else {
        match raw.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => raw,
        }
    };
    host.to_ascii_lowercase()
}

/// Build the gate's view of `request`.
pub fn inbound_request<B>(request: &Request<B>) -> InboundRequest {
    InboundRequest {
        host: request_host(request).unwrap_or_default(),
        cookies: request.headers().get_all(COOKIE).iter().cloned().collect(),
        request_id: request_id(request).map(str::to_string),
    }
}
