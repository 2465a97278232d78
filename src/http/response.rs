//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn a blocking disposition into a client response
//! - Merge gate headers onto origin responses
//! - Strip hop-by-hop headers in both directions
//!
//! # Design Decisions
//! - Gate headers are appended, so origin `Set-Cookie` values survive
//! - Blocked responses have an empty body; the queue headers carry the data

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::Response,
};

/// Headers meaningful only for a single transport hop.
static HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Response for a request the gate refused.
pub fn blocked_response(status: StatusCode, headers: HeaderMap) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Append every entry of `headers` to `response`.
pub fn append_headers(response: &mut Response, headers: &HeaderMap) {
    let target = response.headers_mut();
    for (name, value) in headers {
        target.append(name.clone(), value.clone());
    }
}

/// Remove hop-by-hop headers, including those listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}
