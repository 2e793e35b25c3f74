//! Distance-vector routing subsystem.
//!
//! # Data Flow
//! ```text
//! Every advertise interval (router.rs):
//!     RouteTable → advertisement.rs (encode) → channel.rs → each neighbor
//!     Exporter only: RouteTable → shared.rs (SharedResolutionTable)
//!
//! On every datagram (router.rs):
//!     channel.rs → advertisement.rs (decode, skip bad lines)
//!     → table.rs (merge with cost + 1, strictly cheaper wins)
//! ```
//!
//! # Design Decisions
//! - Routes are never withdrawn or expired; tables only improve
//! - Channels are best effort; loss.rs injects drops for simulations
//! - Routers never share tables directly, only through advertisements

pub mod advertisement;
pub mod channel;
pub mod loss;
pub mod router;
pub mod shared;
pub mod table;

pub use channel::{
    AdvertisementChannel, ChannelError, Datagram, MemoryChannel, MemoryNetwork, UdpChannel,
};
pub use loss::{DropFactor, DropPolicy, LossyChannel, NeverDrop, RandomDrop};
pub use router::{DirectHost, Router, RouterView, RunningRouter};
pub use shared::SharedResolutionTable;
pub use table::{RouteEntry, RouteRecord, RouteTable, HOP_COST};
