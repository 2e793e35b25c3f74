use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::routing::{DirectHost, RouteTable};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub routers: usize,
    pub resolution_entries: usize,
}

#[derive(Serialize)]
pub struct RouterStatus {
    pub name: String,
    pub listen_address: SocketAddr,
    pub exporter: bool,
    pub neighbors: Vec<SocketAddr>,
    pub direct_hosts: Vec<DirectHost>,
    pub routes: RouteTable,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started.elapsed().as_secs(),
        routers: state.routers.len(),
        resolution_entries: state.shared.len(),
    })
}

pub async fn get_resolution(State(state): State<AdminState>) -> Json<BTreeMap<String, IpAddr>> {
    Json(state.shared.snapshot())
}

pub async fn get_routers(State(state): State<AdminState>) -> Json<Vec<RouterStatus>> {
    let statuses = state
        .routers
        .iter()
        .map(|view| RouterStatus {
            name: view.name.clone(),
            listen_address: view.listen_address,
            exporter: view.exporter,
            neighbors: view.neighbors.clone(),
            direct_hosts: view.direct_hosts.clone(),
            routes: view.table(),
        })
        .collect();

    Json(statuses)
}
