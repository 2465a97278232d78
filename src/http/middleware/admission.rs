//! Admission middleware.
//! Consults the admission gate before a request may reach the origin.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::admission::{AdmissionGate, Disposition, EnableTrigger, HttpAdmissionClient};
use crate::config::validation::{parse_service_url, ValidationError};
use crate::config::AdmissionConfig;
use crate::http::request::inbound_request;
use crate::http::response::{append_headers, blocked_response};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Hot-swappable admission settings.
pub struct AdmissionState {
    /// `None` when the gate is disabled.
    pub gate: Option<AdmissionGate<HttpAdmissionClient>>,
    pub trigger: EnableTrigger,
}

impl AdmissionState {
    pub fn from_config(config: &AdmissionConfig) -> Result<Self, ValidationError> {
        if !config.enabled {
            return Ok(Self {
                gate: None,
                trigger: EnableTrigger::disabled(),
            });
        }

        let service_url = parse_service_url(&config.service_url)?;
        Ok(Self {
            gate: Some(AdmissionGate::new(
                HttpAdmissionClient::new(&service_url, config.max_body_bytes),
                config.unclassified_status,
            )),
            trigger: EnableTrigger::new(&config.enable_trigger),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.gate.is_some()
    }
}

pub async fn admission_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let admission = state.admission.load_full();
    let Some(gate) = admission.gate.as_ref() else {
        return next.run(request).await;
    };

    let started = Instant::now();
    let inbound = inbound_request(&request);
    let enable = !inbound.host.is_empty() && admission.trigger.should_enable(&inbound.host);

    match gate.evaluate(&inbound, enable).await {
        Disposition::Continue { headers } => {
            let mut response = next.run(request).await;
            append_headers(&mut response, &headers);
            response
        }
        Disposition::Block { status, headers } => {
            tracing::info!(
                request_id = inbound.request_id.as_deref().unwrap_or("unknown"),
                host = %inbound.host,
                status = %status,
                enable,
                "Request blocked by admission gate"
            );
            metrics::record_request(request.method().as_str(), status.as_u16(), started);
            blocked_response(status, headers)
        }
    }
}
