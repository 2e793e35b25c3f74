//! Proxy accept loop.
//!
//! # Responsibilities
//! - Accept client connections within the connection limit
//! - Spawn one session task per connection
//! - Log and count session outcomes
//! - Stop accepting on shutdown and drain in-flight sessions

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::UpstreamConfig;
use crate::net::{ConnectionTracker, Listener};
use crate::observability::metrics;
use crate::proxy::session;
use crate::resolve::{NameLookup, Resolver};

/// How long shutdown waits for open tunnels before giving up on them.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ProxyServer<L> {
    resolver: Arc<Resolver<L>>,
    upstream: UpstreamConfig,
    tracker: ConnectionTracker,
}

impl<L: NameLookup> ProxyServer<L> {
    pub fn new(resolver: Resolver<L>, upstream: UpstreamConfig) -> Self {
        Self {
            resolver: Arc::new(resolver),
            upstream,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept connections until `shutdown` fires.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(address = %listener.local_addr(), "Proxy accepting connections");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };

                    let guard = self.tracker.track();
                    let resolver = Arc::clone(&self.resolver);
                    let upstream = self.upstream.clone();

                    tokio::spawn(async move {
                        let _permit = permit;
                        let connection_id = guard.id();

                        match session::run(stream, &resolver, &upstream).await {
                            Ok(summary) => {
                                tracing::info!(
                                    connection_id = %connection_id,
                                    peer = %peer,
                                    host = %summary.host,
                                    upstream = %summary.upstream,
                                    source = summary.source.as_str(),
                                    bytes_to_upstream = summary.bytes_to_upstream,
                                    bytes_to_client = summary.bytes_to_client,
                                    "Session finished"
                                );
                                metrics::record_session("forwarded");
                            }
                            Err(e) => {
                                tracing::error!(
                                    connection_id = %connection_id,
                                    peer = %peer,
                                    error = %e,
                                    "Session aborted"
                                );
                                metrics::record_session(e.kind());
                            }
                        }
                        drop(guard);
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!("Proxy received shutdown signal, no longer accepting");
                    break;
                }
            }
        }

        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active, "Draining proxy sessions");
            if tokio::time::timeout(DRAIN_TIMEOUT, self.tracker.wait_idle()).await.is_err() {
                tracing::warn!(
                    remaining = self.tracker.active_count(),
                    "Drain timeout reached, abandoning open sessions"
                );
            }
        }
    }
}
