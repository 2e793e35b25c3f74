//! Simulated distance-vector router.
//!
//! # Responsibilities
//! - Own one route table seeded with directly reachable hosts
//! - Periodically advertise the table to every neighbor
//! - Absorb neighbors' advertisements with the `cost + 1` rule
//! - Publish the table to the shared resolution table when exporting
//!
//! # Design Decisions
//! - Configuration methods take `&mut self`; `spawn` consumes the router, so
//!   configuration can never race the running loops
//! - The route table sits behind a reader/writer lock: the absorb task is the
//!   only writer, the advertise task and admin views are readers
//! - Locks are never held across an `.await`

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::advertisement;
use crate::routing::channel::AdvertisementChannel;
use crate::routing::shared::SharedResolutionTable;
use crate::routing::table::{RouteEntry, RouteTable};

/// Default advertisement period.
pub const DEFAULT_ADVERTISE_INTERVAL: Duration = Duration::from_secs(10);

/// A destination this router reaches without forwarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectHost {
    pub name: String,
    pub address: IpAddr,
    pub cost: u32,
}

pub struct Router<C> {
    name: String,
    advertise_ip: IpAddr,
    channel: Arc<C>,
    table: Arc<RwLock<RouteTable>>,
    direct_hosts: BTreeMap<String, DirectHost>,
    neighbors: Vec<SocketAddr>,
    exporter: Option<SharedResolutionTable>,
    advertise_interval: Duration,
}

impl<C: AdvertisementChannel> Router<C> {
    /// Create a router that advertises its routes as reachable via `advertise_ip`.
    pub fn new(name: impl Into<String>, advertise_ip: IpAddr, channel: C) -> Self {
        Self {
            name: name.into(),
            advertise_ip,
            channel: Arc::new(channel),
            table: Arc::new(RwLock::new(RouteTable::new())),
            direct_hosts: BTreeMap::new(),
            neighbors: Vec::new(),
            exporter: None,
            advertise_interval: DEFAULT_ADVERTISE_INTERVAL,
        }
    }

    pub fn with_advertise_interval(mut self, interval: Duration) -> Self {
        self.advertise_interval = interval;
        self
    }

    /// Register a directly reachable destination. Last write wins.
    pub fn add_direct_host(&mut self, name: impl Into<String>, address: IpAddr, cost: u32) {
        let name = name.into();
        self.write_table().insert(name.clone(), RouteEntry::new(cost, address));
        self.direct_hosts.insert(
            name.clone(),
            DirectHost {
                name,
                address,
                cost,
            },
        );
    }

    /// Add an advertisement target. Duplicate addresses are ignored.
    pub fn add_neighbor(&mut self, address: SocketAddr) {
        if !self.neighbors.contains(&address) {
            self.neighbors.push(address);
        }
    }

    /// Make this router the one whose table feeds `shared`.
    pub fn export_to(&mut self, shared: SharedResolutionTable) {
        self.exporter = Some(shared);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.channel.local_addr()
    }

    pub fn neighbors(&self) -> &[SocketAddr] {
        &self.neighbors
    }

    pub fn is_exporter(&self) -> bool {
        self.exporter.is_some()
    }

    /// Copy of the current route table.
    pub fn table(&self) -> RouteTable {
        self.read_table().clone()
    }

    /// True if `name` is still served by its configured direct route.
    pub fn is_direct(&self, name: &str) -> bool {
        match (self.direct_hosts.get(name), self.read_table().get(name)) {
            (Some(host), Some(entry)) => host.cost == entry.cost && host.address == entry.via,
            _ => false,
        }
    }

    /// Read-only handle for observers such as the admin API.
    pub fn view(&self) -> RouterView {
        RouterView {
            name: self.name.clone(),
            listen_address: self.local_addr(),
            neighbors: self.neighbors.clone(),
            direct_hosts: self.direct_hosts.values().cloned().collect(),
            exporter: self.is_exporter(),
            table: Arc::clone(&self.table),
        }
    }

    /// Run one advertisement tick: send the table to every neighbor and export it.
    ///
    /// Returns how many neighbors the payload was handed to. Send failures are
    /// logged and otherwise ignored; the next tick retries implicitly.
    pub async fn advertise_once(&self) -> usize {
        let snapshot = self.table();
        let payload = advertisement::encode(&snapshot, self.advertise_ip);

        let mut sent = 0;
        for neighbor in &self.neighbors {
            match self.channel.send_to(&payload, *neighbor).await {
                Ok(()) => {
                    sent += 1;
                    metrics::record_advertisement_sent(&self.name);
                }
                Err(e) => {
                    tracing::debug!(
                        router = %self.name,
                        neighbor = %neighbor,
                        error = %e,
                        "Advertisement not sent"
                    );
                }
            }
        }

        if let Some(shared) = &self.exporter {
            shared.publish(&snapshot);
            metrics::record_resolution_table_size(shared.len());
        }

        tracing::info!(
            router = %self.name,
            routes = snapshot.len(),
            neighbors = self.neighbors.len(),
            sent,
            "Routing table\n{}",
            snapshot
        );

        sent
    }

    /// Merge one inbound advertisement payload. Returns how many routes changed.
    pub fn absorb(&self, payload: &[u8], source: SocketAddr) -> usize {
        let (records, rejected) = advertisement::decode(payload);
        for (line, error) in &rejected {
            tracing::debug!(
                router = %self.name,
                source = %source,
                line,
                error = %error,
                "Skipping malformed advertisement line"
            );
        }

        if records.is_empty() {
            return 0;
        }

        let updated = self.write_table().merge_all(&records);
        metrics::record_advertisement_received(&self.name);

        if updated > 0 {
            metrics::record_route_updates(&self.name, updated);
            tracing::debug!(
                router = %self.name,
                source = %source,
                records = records.len(),
                updated,
                "Routes improved"
            );
        }
        updated
    }

    /// Start the advertise and absorb loops. They run until `shutdown` fires.
    pub fn spawn(self, shutdown: &Shutdown) -> RunningRouter {
        let view = self.view();
        let router = Arc::new(self);

        tracing::info!(
            router = %router.name,
            address = %router.local_addr(),
            neighbors = router.neighbors.len(),
            direct_hosts = router.direct_hosts.len(),
            exporter = router.is_exporter(),
            interval_ms = router.advertise_interval.as_millis() as u64,
            "Router starting"
        );

        let advertise = tokio::spawn(Arc::clone(&router).advertise_loop(shutdown.subscribe()));
        let absorb = tokio::spawn(router.absorb_loop(shutdown.subscribe()));

        RunningRouter {
            view,
            tasks: vec![advertise, absorb],
        }
    }

    async fn advertise_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.advertise_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.advertise_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::debug!(router = %self.name, "Advertise loop stopping");
                    break;
                }
            }
        }
    }

    async fn absorb_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                received = self.channel.recv() => match received {
                    Ok(datagram) => {
                        self.absorb(&datagram.payload, datagram.source);
                    }
                    Err(e) => {
                        tracing::warn!(router = %self.name, error = %e, "Advertisement receive failed");
                    }
                },
                _ = shutdown.recv() => {
                    tracing::debug!(router = %self.name, "Absorb loop stopping");
                    break;
                }
            }
        }
    }

    fn read_table(&self) -> std::sync::RwLockReadGuard<'_, RouteTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_table(&self) -> std::sync::RwLockWriteGuard<'_, RouteTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only view of a router shared with observers.
#[derive(Debug, Clone)]
pub struct RouterView {
    pub name: String,
    pub listen_address: SocketAddr,
    pub neighbors: Vec<SocketAddr>,
    pub direct_hosts: Vec<DirectHost>,
    pub exporter: bool,
    table: Arc<RwLock<RouteTable>>,
}

impl RouterView {
    pub fn table(&self) -> RouteTable {
        self.table.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Handles of a spawned router.
#[derive(Debug)]
pub struct RunningRouter {
    pub view: RouterView,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningRouter {
    /// Wait for both loops to exit.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(router = %self.view.name, error = %e, "Router task failed");
            }
        }
    }
}
