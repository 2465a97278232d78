//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and the admission service URL
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admission.service_url: {0}")]
    InvalidServiceUrl(String),

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
}

/// Check every semantic constraint of `config`.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(&mut errors, "upstream.address", &config.upstream.address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admission.enabled {
        if let Err(e) = parse_service_url(&config.admission.service_url) {
            errors.push(e);
        }
    }
    if config.admission.max_body_bytes == 0 {
        errors.push(ValidationError::NotPositive {
            field: "admission.max_body_bytes",
        });
    }

    let trigger = &config.admission.enable_trigger;
    if trigger.enabled {
        if trigger.requests_per_second == 0 {
            errors.push(ValidationError::NotPositive {
                field: "admission.enable_trigger.requests_per_second",
            });
        }
        if trigger.burst_size == 0 {
            errors.push(ValidationError::NotPositive {
                field: "admission.enable_trigger.burst_size",
            });
        }
        if trigger.max_tracked_hosts == 0 {
            errors.push(ValidationError::NotPositive {
                field: "admission.enable_trigger.max_tracked_hosts",
            });
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::NotPositive {
            field: "timeouts.request_secs",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse the admission service base URL; only plain `http` is routed internally.
pub fn parse_service_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|e| ValidationError::InvalidServiceUrl(e.to_string()))?;
    if url.scheme() != "http" {
        return Err(ValidationError::InvalidServiceUrl(format!(
            "unsupported scheme {:?}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ValidationError::InvalidServiceUrl("missing host".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ValidationError::InvalidServiceUrl(
            "query and fragment are not allowed".to_string(),
        ));
    }
    Ok(url)
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.admission.service_url = "https://queue.internal".into();
        config.admission.enable_trigger.enabled = true;
        config.admission.enable_trigger.requests_per_second = 0;
        config.timeouts.request_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::NotPositive {
            field: "timeouts.request_secs"
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidServiceUrl(_))));
    }

    #[test]
    fn test_disabled_gate_skips_service_url() {
        let mut config = ProxyConfig::default();
        config.admission.enabled = false;
        config.admission.service_url = String::new();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_parse_service_url() {
        assert!(parse_service_url("http://127.0.0.1:18080").is_ok());
        assert!(parse_service_url("http://waitingroom.internal/api/").is_ok());
        assert!(parse_service_url("127.0.0.1:18080").is_err());
        assert!(parse_service_url("http://127.0.0.1:18080/?x=1").is_err());
    }
}
