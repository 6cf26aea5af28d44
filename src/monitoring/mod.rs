//! Hierarchical metrics for hosts, applications and streams
//!
//! The registry mirrors the server's host/application/stream tree and keeps
//! byte and session counters at every level. Lifecycle events flow top-down,
//! counter events flow bottom-up.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<Monitoring>
//!                 ┌────────────────────────────┐
//!                 │ hosts: RwLock<HashMap<     │
//!                 │   HostId, HostMetrics {    │
//!                 │     applications: RwLock<  │
//!                 │       ApplicationMetrics { │
//!                 │         streams: RwLock<   │
//!                 │           StreamMetrics    │
//!                 │ >>>>                       │
//!                 └─────────────┬──────────────┘
//!                               │
//!      [viewer session] ──► relay.increase_bytes_out()
//!                               │
//!                               ▼  origin_stream lookup
//!                        origin.increase_bytes_out()
//!                               │
//!                               ▼  no origin: aggregate
//!              application ──► host ──► server totals
//! ```
//!
//! # Counting rules
//!
//! A derived stream (relay, restream) forwards each event to its origin
//! instead of its application. Only a stream without an origin forwards to
//! the application, so the application, host and server totals see each
//! byte and each viewer exactly once.
//!
//! Origins are referenced by id and resolved through the application at
//! event time. An origin that is no longer registered just stops the
//! forwarding.
//!
//! # Locking
//!
//! Each level guards its own map with a `parking_lot::RwLock`. Counters are
//! atomics, and no map lock is held while an event is forwarded to another
//! entity.

pub mod application;
pub mod config;
pub mod error;
pub mod host;
pub mod store;
pub mod stream;

pub use application::ApplicationMetrics;
pub use config::MonitoringConfig;
pub use error::MonitoringError;
pub use host::HostMetrics;
pub use store::Monitoring;
pub use stream::StreamMetrics;
