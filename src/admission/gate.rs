//! The admission gate.
//!
//! # State Machine
//! ```text
//! Start → QueryIssued → Admitted (200)        → Continue
//!                     → Throttled (429)       → Block(503) + queue headers
//!                     → Unclassified (other)  → per UnclassifiedPolicy
//!                     → Failed (error)        → Block(503), two error records
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unreachable or incoherent admission service blocks
//! - `Set-Cookie` from any obtained response is copied before dispatch
//! - Queue headers are written all at once, never partially
//! - No state survives an evaluation

use std::time::Instant;

use axum::http::{
    header::{HeaderName, SET_COOKIE},
    HeaderMap, HeaderValue, StatusCode,
};

use crate::admission::client::AdmissionClient;
use crate::admission::error::{error_chain, GateError};
use crate::admission::types::{AdmissionQueryTarget, Disposition, InboundRequest, Outcome, ThrottleInfo};
use crate::config::UnclassifiedPolicy;
use crate::observability::metrics;

/// Caller's queue position, sent to the client on throttle.
pub const SERIAL_NO: HeaderName = HeaderName::from_static("serial_no");
/// Current admission cutoff, sent to the client on throttle.
pub const PERMITTED_NO: HeaderName = HeaderName::from_static("permitted_no");
/// Estimated wait, sent when the admission service provides one.
pub const REMAINING_WAIT_SECOND: HeaderName = HeaderName::from_static("remaining_wait_second");

/// Status answered to the client for both throttling and failures.
pub const BLOCK_STATUS: StatusCode = StatusCode::SERVICE_UNAVAILABLE;

/// Edge-side admission decision.
pub struct AdmissionGate<C> {
    client: C,
    unclassified: UnclassifiedPolicy,
}

impl<C: AdmissionClient> AdmissionGate<C> {
    pub fn new(client: C, unclassified: UnclassifiedPolicy) -> Self {
        Self { client, unclassified }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Decide whether `request` may reach the origin.
    ///
    /// `enable` asks the admission service to open a waiting room for the
    /// host; it only changes the query path.
    pub async fn evaluate(&self, request: &InboundRequest, enable: bool) -> Disposition {
        let started = Instant::now();
        let mut headers = HeaderMap::new();

        match self.check(request, enable, &mut headers).await {
            Ok(Outcome::Admitted) => {
                metrics::record_admission(Outcome::Admitted.label(), started);
                Disposition::Continue { headers }
            }
            Ok(Outcome::Throttled) => {
                tracing::debug!(
                    host = %request.host,
                    serial_no = ?headers.get(&SERIAL_NO),
                    permitted_no = ?headers.get(&PERMITTED_NO),
                    "Request throttled by admission service"
                );
                metrics::record_admission(Outcome::Throttled.label(), started);
                Disposition::Block { status: BLOCK_STATUS, headers }
            }
            Ok(outcome @ Outcome::Unclassified(status)) => {
                tracing::warn!(
                    host = %request.host,
                    status = %status,
                    policy = ?self.unclassified,
                    "Unclassified admission status"
                );
                metrics::record_admission(outcome.label(), started);
                match self.unclassified {
                    UnclassifiedPolicy::FailOpen => Disposition::Continue { headers },
                    UnclassifiedPolicy::FailClosed => Disposition::Block { status: BLOCK_STATUS, headers },
                }
            }
            Err(err) => {
                tracing::error!(
                    host = %request.host,
                    enable,
                    error = %err,
                    "Admission check failed"
                );
                tracing::error!(
                    host = %request.host,
                    kind = err.kind(),
                    chain = %error_chain(&err),
                    detail = ?err,
                    "Admission check failure trace"
                );
                metrics::record_admission_failure(err.kind(), started);
                Disposition::Block { status: BLOCK_STATUS, headers }
            }
        }
    }

    async fn check(
        &self,
        request: &InboundRequest,
        enable: bool,
        headers: &mut HeaderMap,
    ) -> Result<Outcome, GateError> {
        let target = AdmissionQueryTarget::new(&request.host, enable)?;
        tracing::debug!(
            request_id = request.request_id.as_deref().unwrap_or("unknown"),
            target = %target,
            "Querying admission service"
        );

        let response = self.client.fetch(&target, request).await?;

        for cookie in response.headers.get_all(SET_COOKIE) {
            headers.append(SET_COOKIE, cookie.clone());
        }

        match response.status {
            StatusCode::OK => Ok(Outcome::Admitted),
            StatusCode::TOO_MANY_REQUESTS => {
                let info = ThrottleInfo::from_body(&response.body)?;
                for (name, value) in queue_headers(&info)? {
                    headers.insert(name, value);
                }
                Ok(Outcome::Throttled)
            }
            other => Ok(Outcome::Unclassified(other)),
        }
    }
}

fn queue_headers(info: &ThrottleInfo) -> Result<Vec<(HeaderName, HeaderValue)>, GateError> {
    let mut fields = vec![
        (SERIAL_NO, "serial_no", info.serial_no.to_string()),
        (PERMITTED_NO, "permitted_no", info.permitted_no.to_string()),
    ];
    if let Some(wait) = &info.remaining_wait_second {
        fields.push((REMAINING_WAIT_SECOND, "remaining_wait_second", wait.to_string()));
    }

    fields
        .into_iter()
        .map(|(name, field, value)| {
            HeaderValue::from_str(&value)
                .map(|value| (name, value))
                .map_err(|source| GateError::InvalidQueueHeader { field, source })
        })
        .collect()
}
