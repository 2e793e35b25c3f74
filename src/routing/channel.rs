//! Best-effort datagram channel carrying advertisements between routers.
//!
//! # Responsibilities
//! - Send one payload to one neighbor address (fire and forget)
//! - Block until the next inbound payload arrives
//!
//! # Design Decisions
//! - No delivery, ordering or duplication guarantees
//! - Implementations are shared between the advertise and absorb tasks,
//!   so every method takes `&self`
//! - `MemoryNetwork` gives tests and simulations the same semantics as UDP
//!   without touching real sockets

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// Largest payload that fits in a single UDP datagram over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Errors raised by an advertisement channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no endpoint listening on {0}")]
    Unreachable(SocketAddr),

    #[error("payload of {0} bytes exceeds the datagram limit")]
    TooLarge(usize),

    #[error("channel closed")]
    Closed,
}

/// A received payload and the address it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub source: SocketAddr,
}

/// Unordered, unreliable message channel used to ship advertisements.
#[async_trait]
pub trait AdvertisementChannel: Send + Sync + 'static {
    /// Send one payload to `target`. Success does not imply delivery.
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<(), ChannelError>;

    /// Wait for the next inbound payload.
    async fn recv(&self) -> Result<Datagram, ChannelError>;

    /// Address neighbors use to reach this endpoint.
    fn local_addr(&self) -> SocketAddr;
}

/// UDP socket implementation.
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpChannel {
    /// Bind a UDP socket for advertisements.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ChannelError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ChannelError::Bind { addr, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| ChannelError::Bind { addr, source })?;

        tracing::debug!(address = %local_addr, "Advertisement socket bound");

        Ok(Self { socket, local_addr })
    }
}

#[async_trait]
impl AdvertisementChannel for UdpChannel {
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<(), ChannelError> {
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(ChannelError::TooLarge(payload.len()));
        }
        self.socket.send_to(payload, target).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Datagram, ChannelError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, source) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok(Datagram {
            payload: buf,
            source,
        })
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

type Inboxes = HashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>;

/// In-process hub connecting `MemoryChannel` endpoints by address.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    inboxes: Arc<Mutex<Inboxes>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an endpoint reachable at `addr`. Re-attaching an address replaces the old endpoint.
    pub fn attach(&self, addr: SocketAddr) -> MemoryChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(addr, tx);

        MemoryChannel {
            network: self.clone(),
            local_addr: addr,
            inbox: AsyncMutex::new(rx),
        }
    }

    fn deliver(&self, target: SocketAddr, datagram: Datagram) -> Result<(), ChannelError> {
        let inboxes = self.inboxes.lock().unwrap_or_else(PoisonError::into_inner);
        let inbox = inboxes.get(&target).ok_or(ChannelError::Unreachable(target))?;
        inbox
            .send(datagram)
            .map_err(|_| ChannelError::Unreachable(target))
    }
}

/// One endpoint of a `MemoryNetwork`.
#[derive(Debug)]
pub struct MemoryChannel {
    network: MemoryNetwork,
    local_addr: SocketAddr,
    inbox: AsyncMutex<mpsc::UnboundedReceiver<Datagram>>,
}

impl MemoryChannel {
    /// Take a pending datagram without waiting.
    pub fn try_recv(&self) -> Option<Datagram> {
        self.inbox.try_lock().ok()?.try_recv().ok()
    }
}

#[async_trait]
impl AdvertisementChannel for MemoryChannel {
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<(), ChannelError> {
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(ChannelError::TooLarge(payload.len()));
        }
        self.network.deliver(
            target,
            Datagram {
                payload: payload.to_vec(),
                source: self.local_addr,
            },
        )
    }

    async fn recv(&self) -> Result<Datagram, ChannelError> {
        self.inbox.lock().await.recv().await.ok_or(ChannelError::Closed)
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
