//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the admission proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Origin that admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Admission gate settings.
    pub admission: AdmissionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Origin server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Origin address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// What the gate does with admission statuses other than 200 and 429.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiedPolicy {
    /// Let the request through with the copied cookies.
    #[default]
    FailOpen,
    /// Block the request with 503.
    FailClosed,
}

/// Admission gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Consult the admission service at all.
    pub enabled: bool,

    /// Internally routed base URL of the admission service.
    pub service_url: String,

    /// Handling of statuses outside {200, 429}.
    pub unclassified_status: UnclassifiedPolicy,

    /// Largest admission response body read, in bytes.
    pub max_body_bytes: usize,

    /// When to ask the service to open a waiting room.
    pub enable_trigger: EnableTriggerConfig,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_url: "http://127.0.0.1:18080".to_string(),
            unclassified_status: UnclassifiedPolicy::FailOpen,
            max_body_bytes: 64 * 1024,
            enable_trigger: EnableTriggerConfig::default(),
        }
    }
}

/// Local per-host rate that, once exceeded, switches queries to `/enable`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnableTriggerConfig {
    /// Enable the trigger.
    pub enabled: bool,

    /// Sustained requests per second per host.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,

    /// Upper bound on hosts with a live bucket.
    pub max_tracked_hosts: usize,
}

impl Default for EnableTriggerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
            burst_size: 50,
            max_tracked_hosts: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (admission check plus origin round trip) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
