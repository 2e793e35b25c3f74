//! One forwarding session: resolve, connect upstream, relay.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{self, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::UpstreamConfig;
use crate::proxy::request::{host_target, read_head};
use crate::proxy::SessionError;
use crate::resolve::{NameLookup, Resolver, Source};

/// Outcome of a session that reached the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub host: String,
    pub upstream: SocketAddr,
    pub source: Source,
    pub bytes_to_upstream: u64,
    pub bytes_to_client: u64,
}

/// Serve one client connection until either side closes.
pub async fn run<L: NameLookup>(
    mut client: TcpStream,
    resolver: &Resolver<L>,
    upstream: &UpstreamConfig,
) -> Result<SessionSummary, SessionError> {
    let head = read_head(&mut client, upstream.max_header_bytes).await?;
    let target = host_target(&head).ok_or(SessionError::MissingHost)?;

    let (ip, source) = resolver.resolve_with_source(&target.name).await?;
    let addr = SocketAddr::new(ip, target.port.unwrap_or(upstream.default_port));

    let connect_timeout = Duration::from_secs(upstream.connect_timeout_secs);
    let mut server = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(SessionError::Connect { addr, source }),
        Err(_) => return Err(SessionError::ConnectTimeout(addr)),
    };

    tracing::debug!(host = %target.name, upstream = %addr, "Upstream connected");

    server.write_all(&head).await?;
    let (to_upstream, to_client) = io::copy_bidirectional(&mut client, &mut server).await?;

    Ok(SessionSummary {
        host: target.name,
        upstream: addr,
        source,
        bytes_to_upstream: to_upstream + head.len() as u64,
        bytes_to_client: to_client,
    })
}
