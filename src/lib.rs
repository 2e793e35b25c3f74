//! Forwarding HTTP proxy steered by simulated distance-vector routers.

pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resolve;
pub mod routing;

pub use config::ProxyConfig;
pub use lifecycle::{Node, Shutdown};
pub use resolve::Resolver;
pub use routing::{Router, SharedResolutionTable};
