//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file. Every section has defaults so a minimal file (or none) works.

use serde::{Deserialize, Serialize};

/// Root configuration for a dv-proxy process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy listener (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Upstream connection settings.
    pub upstream: UpstreamConfig,

    /// Settings shared by every simulated router.
    pub routing: RoutingConfig,

    /// Simulated routers hosted by this process.
    pub routers: Vec<RouterConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Read-only admin API.
    pub admin: AdminConfig,
}

/// Proxy listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            max_connections: 1024,
        }
    }
}

/// How the proxy reaches origin servers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Port used when the Host header carries none.
    pub default_port: u16,

    /// Upstream connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Largest accepted request head, in bytes.
    pub max_header_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            default_port: 80,
            connect_timeout_secs: 5,
            max_header_bytes: 64 * 1024,
        }
    }
}

/// Settings shared by all routers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Period between two advertisements, in milliseconds.
    pub advertise_interval_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            advertise_interval_ms: 10_000,
        }
    }
}

/// One simulated router.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Router name used in logs and the admin API.
    pub name: String,

    /// UDP address the router receives advertisements on.
    pub listen_address: String,

    /// Address announced as next hop in advertisements.
    /// Defaults to the IP of `listen_address`.
    #[serde(default)]
    pub advertise_ip: Option<String>,

    /// Whether this router feeds the proxy's resolution table.
    #[serde(default)]
    pub export: bool,

    /// Advertisement targets.
    #[serde(default)]
    pub neighbors: Vec<String>,

    /// Directly reachable destinations.
    #[serde(default)]
    pub direct_hosts: Vec<DirectHostConfig>,

    /// Drop one outgoing advertisement every N sends (0 = never).
    #[serde(default)]
    pub drop_every: usize,

    /// Probability of dropping each outgoing advertisement (0.0 - 1.0).
    #[serde(default)]
    pub loss_rate: f64,
}

/// A destination reachable without forwarding.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectHostConfig {
    pub name: String,
    pub address: String,
    #[serde(default = "default_direct_cost")]
    pub cost: u32,
}

fn default_direct_cost() -> u32 {
    1
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// Admin API bind address. It has no authentication: keep it on loopback.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:5080".to_string(),
        }
    }
}
