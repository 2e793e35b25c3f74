//! End-to-end proxy behavior: routing overrides, fallback lookup, failures
//! and the admin API.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use dv_proxy::config::{DirectHostConfig, ListenerConfig, ProxyConfig, RouterConfig};
use dv_proxy::lifecycle::{self, Node, Shutdown};
use dv_proxy::resolve::NameLookup;

mod common;

/// Fallback that only knows `fallback.test`.
struct TestLookup;

#[async_trait]
impl NameLookup for TestLookup {
    async fn lookup(&self, name: &str) -> io::Result<Vec<IpAddr>> {
        match name {
            "fallback.test" => Ok(vec!["::1".parse().unwrap(), "127.0.0.1".parse().unwrap()]),
            _ => Err(io::Error::new(io::ErrorKind::NotFound, "no such host")),
        }
    }
}

fn config(origin: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig {
        listener: ListenerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            max_connections: 32,
        },
        ..ProxyConfig::default()
    };
    config.upstream.default_port = origin.port();
    config.upstream.connect_timeout_secs = 2;
    config.routing.advertise_interval_ms = 20;
    config.admin.enabled = true;
    config.admin.bind_address = "127.0.0.1:0".to_string();
    config.routers = vec![RouterConfig {
        name: "edge".into(),
        listen_address: "127.0.0.1:0".into(),
        advertise_ip: None,
        export: true,
        neighbors: Vec::new(),
        direct_hosts: vec![DirectHostConfig {
            name: "origin.test".into(),
            address: origin.ip().to_string(),
            cost: 1,
        }],
        drop_every: 0,
        loss_rate: 0.0,
    }];
    config
}

async fn start(config: ProxyConfig, shutdown: &Shutdown) -> Node {
    let node = lifecycle::start_with_lookup(&config, TestLookup, shutdown)
        .await
        .unwrap();

    let shared = node.shared.clone();
    let published = common::eventually(Duration::from_secs(5), || {
        shared.lookup("origin.test").is_some()
    })
    .await;
    assert!(published, "exporter never published origin.test");
    node
}

fn as_text(response: &[u8]) -> String {
    String::from_utf8_lossy(response).into_owned()
}

#[tokio::test]
async fn routing_override_reaches_origin() {
    let origin = common::start_echo_origin().await;
    let shutdown = Shutdown::new();
    let node = start(config(origin), &shutdown).await;

    let response = as_text(&common::probe(node.proxy_address, "origin.test").await);
    assert!(response.starts_with("HTTP/1.1 200 OK"), "unexpected response: {response}");
    // The head is forwarded unchanged.
    assert!(response.contains("GET /probe HTTP/1.1\r\nHost: origin.test\r\n"));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(10), node.join()).await.unwrap();
}

#[tokio::test]
async fn explicit_host_port_overrides_default() {
    let origin = common::start_echo_origin().await;
    let mut config = config(origin);
    // Nothing listens on the default port.
    config.upstream.default_port = 1;

    let shutdown = Shutdown::new();
    let node = start(config, &shutdown).await;

    let response = common::probe(node.proxy_address, "origin.test").await;
    assert!(response.is_empty());

    let host = format!("origin.test:{}", origin.port());
    let response = as_text(&common::probe(node.proxy_address, &host).await);
    assert!(response.starts_with("HTTP/1.1 200 OK"));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(10), node.join()).await.unwrap();
}

#[tokio::test]
async fn fallback_lookup_prefers_ipv4() {
    let origin = common::start_echo_origin().await;
    let shutdown = Shutdown::new();
    let node = start(config(origin), &shutdown).await;

    let response = as_text(&common::probe(node.proxy_address, "fallback.test").await);
    assert!(response.starts_with("HTTP/1.1 200 OK"), "unexpected response: {response}");
    assert!(response.contains("Host: fallback.test"));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(10), node.join()).await.unwrap();
}

#[tokio::test]
async fn unresolvable_host_closes_without_response() {
    let origin = common::start_echo_origin().await;
    let shutdown = Shutdown::new();
    let node = start(config(origin), &shutdown).await;

    let response = common::probe(node.proxy_address, "missing.test").await;
    assert!(response.is_empty());

    // The proxy keeps serving after a failed session.
    let response = as_text(&common::probe(node.proxy_address, "origin.test").await);
    assert!(response.starts_with("HTTP/1.1 200 OK"));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(10), node.join()).await.unwrap();
}

#[tokio::test]
async fn admin_api_exposes_tables() {
    let origin = common::start_echo_origin().await;
    let shutdown = Shutdown::new();
    let node = start(config(origin), &shutdown).await;
    let admin = node.admin_address.expect("admin API enabled");
    let client = reqwest::Client::new();

    let resolution: Value = client
        .get(format!("http://{admin}/admin/resolution"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resolution["origin.test"], "127.0.0.1");

    let routers: Value = client
        .get(format!("http://{admin}/admin/routers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(routers[0]["name"], "edge");
    assert_eq!(routers[0]["routes"]["origin.test"]["cost"], 1);

    let status = client
        .get(format!("http://{admin}/admin/status"))
        .send()
        .await
        .unwrap();
    assert!(status.status().is_success());

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(10), node.join()).await.unwrap();
}
