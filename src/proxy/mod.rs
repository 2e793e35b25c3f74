//! Forwarding proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Client connection
//!     → server.rs (accept loop, one task per connection)
//!     → request.rs (read head, extract Host)
//!     → resolve.rs (routing table first, DNS fallback)
//!     → session.rs (connect upstream, relay both directions)
//! ```
//!
//! # Design Decisions
//! - Sessions share nothing mutable; they only read the resolution table
//! - Any failure before the tunnel is up closes the client connection
//!   without writing an HTTP response
//! - The request head is forwarded byte for byte

pub mod request;
pub mod server;
pub mod session;

use std::net::SocketAddr;

use thiserror::Error;

use crate::resolve::ResolveError;

pub use server::ProxyServer;
pub use session::SessionSummary;

/// Why a proxy session ended without forwarding.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("client closed after {0} bytes, before the end of the request head")]
    Incomplete(usize),

    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),

    #[error("request has no Host header")]
    MissingHost,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {0}")]
    ConnectTimeout(SocketAddr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Incomplete(_) => "incomplete",
            SessionError::HeadTooLarge(_) => "head_too_large",
            SessionError::MissingHost => "missing_host",
            SessionError::Resolve(_) => "unresolved",
            SessionError::Connect { .. } | SessionError::ConnectTimeout(_) => "connect_failed",
            SessionError::Io(_) => "io",
        }
    }
}
