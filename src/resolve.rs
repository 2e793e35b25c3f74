//! Destination name resolution for proxied requests.
//!
//! # Resolution Order
//! 1. Shared resolution table (routing override, no DNS query)
//! 2. Conventional name lookup through a `NameLookup` implementation
//!
//! # Design Decisions
//! - The table read is a single shared-lock lookup, safe from any task
//! - IPv4 answers are preferred over IPv6 from the fallback
//! - "Nothing found" and "lookup failed" are distinct errors so callers can log them apart

use std::io;
use std::net::IpAddr;

use async_trait::async_trait;
use thiserror::Error;

use crate::observability::metrics;
use crate::routing::SharedResolutionTable;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("could not resolve {0}")]
    NotFound(String),

    #[error("lookup for {name} failed: {source}")]
    Lookup {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Conventional (non-routed) name lookup.
#[async_trait]
pub trait NameLookup: Send + Sync + 'static {
    async fn lookup(&self, name: &str) -> io::Result<Vec<IpAddr>>;
}

/// Lookup through the operating system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

#[async_trait]
impl NameLookup for SystemLookup {
    async fn lookup(&self, name: &str) -> io::Result<Vec<IpAddr>> {
        // The port is required by the API and discarded.
        let addrs = tokio::net::lookup_host((name, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Where a resolved address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Routing,
    Fallback,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Routing => "routing",
            Source::Fallback => "fallback",
        }
    }
}

pub struct Resolver<L = SystemLookup> {
    table: SharedResolutionTable,
    fallback: L,
}

impl Resolver<SystemLookup> {
    pub fn new(table: SharedResolutionTable) -> Self {
        Self::with_lookup(table, SystemLookup)
    }
}

impl<L: NameLookup> Resolver<L> {
    pub fn with_lookup(table: SharedResolutionTable, fallback: L) -> Self {
        Self { table, fallback }
    }

    /// Resolve `name` to a single address.
    pub async fn resolve(&self, name: &str) -> Result<IpAddr, ResolveError> {
        self.resolve_with_source(name).await.map(|(ip, _)| ip)
    }

    pub async fn resolve_with_source(&self, name: &str) -> Result<(IpAddr, Source), ResolveError> {
        if let Some(ip) = self.table.lookup(name) {
            tracing::info!(host = %name, address = %ip, "Routing override");
            metrics::record_resolution(Source::Routing.as_str());
            return Ok((ip, Source::Routing));
        }

        let answers = self
            .fallback
            .lookup(name)
            .await
            .map_err(|source| {
                metrics::record_resolution("failed");
                ResolveError::Lookup {
                    name: name.to_string(),
                    source,
                }
            })?;

        let chosen = answers
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| answers.first())
            .copied();

        match chosen {
            Some(ip) => {
                tracing::debug!(host = %name, address = %ip, "Resolved via fallback");
                metrics::record_resolution(Source::Fallback.as_str());
                Ok((ip, Source::Fallback))
            }
            None => {
                metrics::record_resolution("failed");
                Err(ResolveError::NotFound(name.to_string()))
            }
        }
    }
}
