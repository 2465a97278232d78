//! Admission gate error taxonomy.

use std::error::Error as StdError;

use thiserror::Error;

/// Errors raised while consulting the admission service.
///
/// Every variant is turned into a 503 by the gate; none reaches the host.
#[derive(Debug, Error)]
pub enum GateError {
    /// The inbound request carried no usable host.
    #[error("inbound request has no host")]
    MissingHost,

    /// The host cannot be embedded in a query path.
    #[error("host {0:?} cannot address an admission queue")]
    InvalidHost(String),

    /// The query URI could not be assembled.
    #[error("invalid admission query uri: {0}")]
    InvalidTarget(#[from] axum::http::uri::InvalidUri),

    /// The query request could not be assembled.
    #[error("failed to build admission request: {0}")]
    Request(#[from] axum::http::Error),

    /// The sub-request did not complete.
    #[error("admission service unreachable: {0}")]
    Unreachable(#[from] hyper_util::client::legacy::Error),

    /// The response body could not be read.
    #[error("failed to read admission response body: {0}")]
    Body(#[source] axum::Error),

    /// A 429 response whose body is not a queue position.
    #[error("malformed throttle body: {0}")]
    MalformedThrottleBody(#[source] serde_json::Error),

    /// A queue field cannot be carried in an HTTP header.
    #[error("queue field {field} is not a valid header value")]
    InvalidQueueHeader {
        field: &'static str,
        #[source]
        source: axum::http::header::InvalidHeaderValue,
    },
}

impl GateError {
    /// Short, stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::MissingHost | GateError::InvalidHost(_) => "invalid_host",
            GateError::InvalidTarget(_) | GateError::Request(_) => "invalid_request",
            GateError::Unreachable(_) | GateError::Body(_) => "unreachable",
            GateError::MalformedThrottleBody(_) | GateError::InvalidQueueHeader { .. } => {
                "malformed_throttle_body"
            }
        }
    }
}

/// Render an error and all of its sources on one line.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
