//! Counters and snapshots
//!
//! Provides the counter block embedded in every monitored entity.

pub mod metrics;

pub use metrics::{CounterBlock, CounterEvent, CounterSnapshot};
