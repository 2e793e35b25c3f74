//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Bind every socket (router channels, admin, proxy) before spawning anything
//! - Start routers, then the admin API, then the proxy accept loop
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and leaves no task running
//! - Subsystems initialize in order, not concurrently
//! - The proxy starts last (traffic only when routing is running)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::config::{validate_config, ProxyConfig, RouterConfig, ValidationError};
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::proxy::ProxyServer;
use crate::resolve::{NameLookup, Resolver, SystemLookup};
use crate::routing::{
    loss, ChannelError, LossyChannel, Router, RouterView, RunningRouter, SharedResolutionTable,
    UdpChannel,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration ({} errors)", .0.len())]
    Config(Vec<ValidationError>),

    #[error("{field}: invalid address {value:?}")]
    Address { field: String, value: String },

    #[error("router {router:?}: {source}")]
    Router {
        router: String,
        #[source]
        source: ChannelError,
    },

    #[error("proxy listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("failed to bind admin API on {addr}: {source}")]
    Admin {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// A running dv-proxy process.
pub struct Node {
    pub shared: SharedResolutionTable,
    pub routers: Vec<RouterView>,
    pub proxy_address: SocketAddr,
    pub admin_address: Option<SocketAddr>,
    running: Vec<RunningRouter>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Node {
    /// Wait for every subsystem to stop. Returns once shutdown has been
    /// triggered and all tasks have exited.
    pub async fn join(self) {
        for router in self.running {
            router.join().await;
        }
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "Task failed");
            }
        }
    }
}

/// Start every subsystem with system DNS as the resolution fallback.
pub async fn start(config: &ProxyConfig, shutdown: &Shutdown) -> Result<Node, StartupError> {
    start_with_lookup(config, SystemLookup, shutdown).await
}

/// Start every subsystem with a custom resolution fallback.
pub async fn start_with_lookup<L: NameLookup>(
    config: &ProxyConfig,
    lookup: L,
    shutdown: &Shutdown,
) -> Result<Node, StartupError> {
    validate_config(config).map_err(StartupError::Config)?;

    let shared = SharedResolutionTable::new();
    let interval = Duration::from_millis(config.routing.advertise_interval_ms);

    let mut routers = Vec::with_capacity(config.routers.len());
    for router_config in &config.routers {
        routers.push(build_router(router_config, interval, &shared).await?);
    }

    if !routers.iter().any(|r| r.is_exporter()) {
        tracing::warn!("No router exports its table, every name will go to DNS");
    }

    let admin_listener = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address)
            .await
            .map_err(|source| StartupError::Admin {
                addr: config.admin.bind_address.clone(),
                source,
            })?;
        Some(listener)
    } else {
        None
    };

    let proxy_listener = Listener::bind(&config.listener).await?;
    let proxy_address = proxy_listener.local_addr();

    let running: Vec<RunningRouter> = routers.into_iter().map(|r| r.spawn(shutdown)).collect();
    let views: Vec<RouterView> = running.iter().map(|r| r.view.clone()).collect();

    let mut tasks = Vec::new();
    let mut admin_address = None;

    if let Some(listener) = admin_listener {
        admin_address = listener.local_addr().ok();
        let state = AdminState::new(shared.clone(), views.clone());
        let signalled = shutdown.signalled();
        tasks.push((
            "admin",
            tokio::spawn(async move {
                if let Err(e) = admin::serve(listener, state, signalled).await {
                    tracing::error!(error = %e, "Admin API failed");
                }
            }),
        ));
    }

    let server = ProxyServer::new(Resolver::with_lookup(shared.clone(), lookup), config.upstream.clone());
    tasks.push(("proxy", tokio::spawn(server.run(proxy_listener, shutdown.subscribe()))));

    tracing::info!(
        proxy = %proxy_address,
        routers = views.len(),
        admin = ?admin_address,
        "dv-proxy started"
    );

    Ok(Node {
        shared,
        routers: views,
        proxy_address,
        admin_address,
        running,
        tasks,
    })
}

async fn build_router(
    config: &RouterConfig,
    interval: Duration,
    shared: &SharedResolutionTable,
) -> Result<Router<LossyChannel<UdpChannel>>, StartupError> {
    let field = |name: &str| format!("routers.{}.{}", config.name, name);

    let listen: SocketAddr = parse(&config.listen_address, || field("listen_address"))?;
    let advertise_ip: IpAddr = match &config.advertise_ip {
        Some(ip) => parse(ip, || field("advertise_ip"))?,
        None => listen.ip(),
    };

    let channel = UdpChannel::bind(listen)
        .await
        .map_err(|source| StartupError::Router {
            router: config.name.clone(),
            source,
        })?;
    let channel = LossyChannel::new(channel, loss::policy_for(config.drop_every, config.loss_rate));

    let mut router = Router::new(config.name.clone(), advertise_ip, channel).with_advertise_interval(interval);

    for host in &config.direct_hosts {
        let address: IpAddr = parse(&host.address, || field("direct_hosts"))?;
        router.add_direct_host(host.name.clone(), address, host.cost);
    }
    for neighbor in &config.neighbors {
        router.add_neighbor(parse(neighbor, || field("neighbors"))?);
    }
    if config.export {
        router.export_to(shared.clone());
    }

    Ok(router)
}

fn parse<T: std::str::FromStr>(value: &str, field: impl FnOnce() -> String) -> Result<T, StartupError> {
    value.parse().map_err(|_| StartupError::Address {
        field: field(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DirectHostConfig, ListenerConfig};

    fn router_config(name: &str, export: bool) -> RouterConfig {
        RouterConfig {
            name: name.to_string(),
            listen_address: "127.0.0.1:0".to_string(),
            advertise_ip: None,
            export,
            neighbors: Vec::new(),
            direct_hosts: vec![DirectHostConfig {
                name: format!("{name}.test"),
                address: "10.0.0.1".to_string(),
                cost: 1,
            }],
            drop_every: 0,
            loss_rate: 0.0,
        }
    }

    fn config() -> ProxyConfig {
        ProxyConfig {
            listener: ListenerConfig {
                bind_address: "127.0.0.1:0".to_string(),
                max_connections: 16,
            },
            ..ProxyConfig::default()
        }
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_binding() {
        let mut config = config();
        config.routers = vec![router_config("a", true), router_config("b", true)];

        let shutdown = Shutdown::new();
        match start(&config, &shutdown).await {
            Err(StartupError::Config(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(errors[0], ValidationError::MultipleExporters(_)));
            }
            other => panic!("expected config error, got {:?}", other.map(|n| n.proxy_address)),
        }
        assert_eq!(shutdown.receiver_count(), 0);
    }

    #[tokio::test]
    async fn exporter_seeds_shared_table_and_node_stops_on_shutdown() {
        let mut config = config();
        config.routing.advertise_interval_ms = 20;
        config.routers = vec![router_config("edge", true)];

        let shutdown = Shutdown::new();
        let node = start(&config, &shutdown).await.unwrap();
        assert_eq!(node.routers.len(), 1);
        assert!(node.admin_address.is_none());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while node.shared.lookup("edge.test").is_none() {
            assert!(tokio::time::Instant::now() < deadline, "exporter never published");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(node.shared.lookup("edge.test"), Some("10.0.0.1".parse().unwrap()));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), node.join())
            .await
            .expect("node did not stop");
    }
}
