//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Check router names and listen addresses are unique
//! - Enforce a single exporting router
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: &ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before any socket is bound

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::{ProxyConfig, RouterConfig};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    SocketAddress { field: String, value: String },

    #[error("{field}: invalid IP address {value:?}")]
    IpAddress { field: String, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("routers[{index}].name must not be empty")]
    EmptyName { index: usize },

    #[error("duplicate router name {0:?}")]
    DuplicateRouter(String),

    #[error("routers {first:?} and {second:?} both listen on {address}")]
    DuplicateListenAddress {
        first: String,
        second: String,
        address: SocketAddr,
    },

    #[error("router {0:?}: advertise_ip is required when listening on an unspecified address")]
    UnspecifiedAdvertiseIp(String),

    #[error("router {router:?}: invalid direct host name {name:?}")]
    DirectHostName { router: String, name: String },

    #[error("router {0:?}: loss_rate must be within 0.0..=1.0")]
    LossRate(String),

    #[error("only one router may export, found {0:?}")]
    MultipleExporters(Vec<String>),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero {
            field: "listener.max_connections".into(),
        });
    }
    if config.upstream.default_port == 0 {
        errors.push(ValidationError::Zero {
            field: "upstream.default_port".into(),
        });
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "upstream.connect_timeout_secs".into(),
        });
    }
    if config.upstream.max_header_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "upstream.max_header_bytes".into(),
        });
    }
    if config.routing.advertise_interval_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "routing.advertise_interval_ms".into(),
        });
    }
    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    let mut names = HashSet::new();
    let mut listeners: Vec<(SocketAddr, &str)> = Vec::new();
    for (index, router) in config.routers.iter().enumerate() {
        if router.name.is_empty() {
            errors.push(ValidationError::EmptyName { index });
        } else if !names.insert(router.name.as_str()) {
            errors.push(ValidationError::DuplicateRouter(router.name.clone()));
        }

        if let Some(addr) = check_socket_addr(
            &mut errors,
            &format!("routers[{}].listen_address", index),
            &router.listen_address,
        ) {
            // Port 0 asks the OS for an ephemeral port, so it never collides.
            match listeners.iter().find(|(other, _)| addr.port() != 0 && *other == addr) {
                Some((_, first)) => errors.push(ValidationError::DuplicateListenAddress {
                    first: first.to_string(),
                    second: router.name.clone(),
                    address: addr,
                }),
                None => listeners.push((addr, router.name.as_str())),
            }
        }

        validate_router(&mut errors, index, router);
    }

    let exporters: Vec<String> = config
        .routers
        .iter()
        .filter(|r| r.export)
        .map(|r| r.name.clone())
        .collect();
    if exporters.len() > 1 {
        errors.push(ValidationError::MultipleExporters(exporters));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_router(errors: &mut Vec<ValidationError>, index: usize, router: &RouterConfig) {
    let prefix = format!("routers[{}]", index);

    match &router.advertise_ip {
        Some(ip) => {
            check_ip_addr(errors, &format!("{}.advertise_ip", prefix), ip);
        }
        None => {
            let unspecified = router
                .listen_address
                .parse::<SocketAddr>()
                .map(|addr| addr.ip().is_unspecified())
                .unwrap_or(false);
            if unspecified {
                errors.push(ValidationError::UnspecifiedAdvertiseIp(router.name.clone()));
            }
        }
    }

    for (n, neighbor) in router.neighbors.iter().enumerate() {
        check_socket_addr(errors, &format!("{}.neighbors[{}]", prefix, n), neighbor);
    }

    for (n, host) in router.direct_hosts.iter().enumerate() {
        // Names travel in a space-separated, newline-terminated wire format.
        if host.name.is_empty() || host.name.contains(char::is_whitespace) {
            errors.push(ValidationError::DirectHostName {
                router: router.name.clone(),
                name: host.name.clone(),
            });
        }
        check_ip_addr(errors, &format!("{}.direct_hosts[{}].address", prefix, n), &host.address);
    }

    if !(0.0..=1.0).contains(&router.loss_rate) {
        errors.push(ValidationError::LossRate(router.name.clone()));
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) -> Option<SocketAddr> {
    match value.parse::<SocketAddr>() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::SocketAddress {
                field: field.to_string(),
                value: value.to_string(),
            });
            None
        }
    }
}

fn check_ip_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) -> Option<IpAddr> {
    match value.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) => {
            errors.push(ValidationError::IpAddress {
                field: field.to_string(),
                value: value.to_string(),
            });
            None
        }
    }
}
