//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Routers and proxy sessions produce:
//!     → logging.rs (structured log events, per-tick table dumps)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape (optional)
//! ```

pub mod logging;
pub mod metrics;
