//! Convergence of routers exchanging advertisements over real UDP sockets.

use std::net::IpAddr;
use std::time::Duration;

use dv_proxy::config::{DirectHostConfig, ListenerConfig, ProxyConfig, RouterConfig};
use dv_proxy::lifecycle::{self, Shutdown};
use dv_proxy::routing::{
    AdvertisementChannel, RouteEntry, Router, SharedResolutionTable, UdpChannel,
};

mod common;

const TICK: Duration = Duration::from_millis(20);

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[tokio::test]
async fn line_of_three_converges_and_exports() {
    let a_channel = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let b_channel = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let c_channel = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

    let (a_addr, b_addr, c_addr) = (
        a_channel.local_addr(),
        b_channel.local_addr(),
        c_channel.local_addr(),
    );

    // Distinct advertise IPs make the next hop observable even though every
    // socket lives on loopback.
    let mut a = Router::new("a", ip("10.0.0.1"), a_channel).with_advertise_interval(TICK);
    a.add_direct_host("far.test", ip("192.0.2.10"), 1);
    a.add_neighbor(b_addr);

    let mut b = Router::new("b", ip("10.0.0.2"), b_channel).with_advertise_interval(TICK);
    b.add_neighbor(a_addr);
    b.add_neighbor(c_addr);

    let shared = SharedResolutionTable::new();
    let mut c = Router::new("c", ip("10.0.0.3"), c_channel).with_advertise_interval(TICK);
    c.add_direct_host("near.test", ip("192.0.2.20"), 1);
    c.add_neighbor(b_addr);
    c.export_to(shared.clone());

    let shutdown = Shutdown::new();
    let a = a.spawn(&shutdown);
    let b = b.spawn(&shutdown);
    let c = c.spawn(&shutdown);

    let converged = common::eventually(Duration::from_secs(5), || {
        c.view.table().get("far.test") == Some(&RouteEntry::new(3, ip("10.0.0.2")))
            && a.view.table().get("near.test") == Some(&RouteEntry::new(3, ip("10.0.0.2")))
            && shared.lookup("far.test").is_some()
    })
    .await;
    assert!(converged, "routers did not converge");

    assert_eq!(
        b.view.table().get("far.test"),
        Some(&RouteEntry::new(2, ip("10.0.0.1")))
    );
    assert_eq!(
        b.view.table().get("near.test"),
        Some(&RouteEntry::new(2, ip("10.0.0.3")))
    );
    assert_eq!(
        a.view.table().get("far.test"),
        Some(&RouteEntry::new(1, ip("192.0.2.10")))
    );

    // The exporter publishes next hops, not the final destination.
    assert_eq!(shared.lookup("far.test"), Some(ip("10.0.0.2")));
    assert_eq!(shared.lookup("near.test"), Some(ip("192.0.2.20")));

    shutdown.trigger();
    for router in [a, b, c] {
        tokio::time::timeout(Duration::from_secs(2), router.join())
            .await
            .expect("router did not stop");
    }
}

#[tokio::test]
async fn lossy_links_still_converge() {
    // Fixed ports are needed so routers can name each other as neighbors.
    let ports = [38411u16, 38412];
    let address = |port: u16| format!("127.0.0.1:{}", port);

    let mut config = ProxyConfig {
        listener: ListenerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            max_connections: 8,
        },
        ..ProxyConfig::default()
    };
    config.routing.advertise_interval_ms = 20;
    config.routers = vec![
        RouterConfig {
            name: "origin-side".into(),
            listen_address: address(ports[0]),
            advertise_ip: Some("10.1.0.1".into()),
            export: false,
            neighbors: vec![address(ports[1])],
            direct_hosts: vec![DirectHostConfig {
                name: "lossy.test".into(),
                address: "192.0.2.30".into(),
                cost: 1,
            }],
            drop_every: 2,
            loss_rate: 0.0,
        },
        RouterConfig {
            name: "proxy-side".into(),
            listen_address: address(ports[1]),
            advertise_ip: Some("10.1.0.2".into()),
            export: true,
            neighbors: vec![address(ports[0])],
            direct_hosts: Vec::new(),
            drop_every: 0,
            loss_rate: 0.5,
        },
    ];

    let shutdown = Shutdown::new();
    let node = lifecycle::start(&config, &shutdown).await.unwrap();

    let shared = node.shared.clone();
    let converged = common::eventually(Duration::from_secs(5), || {
        shared.lookup("lossy.test") == Some(ip("10.1.0.1"))
    })
    .await;
    assert!(converged, "route never crossed the lossy link");

    let proxy_side = node.routers.iter().find(|r| r.name == "proxy-side").unwrap();
    assert_eq!(
        proxy_side.table().get("lossy.test"),
        Some(&RouteEntry::new(2, ip("10.1.0.1")))
    );

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(10), node.join())
        .await
        .expect("node did not stop");
}
