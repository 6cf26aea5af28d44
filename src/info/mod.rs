//! Descriptors of the entities being monitored
//!
//! The server owns hosts, applications and streams; monitoring only sees
//! these lightweight descriptors.

pub mod descriptor;
pub mod types;

pub use descriptor::{ApplicationId, ApplicationInfo, HostId, HostInfo, StreamId, StreamInfo};
pub use types::{PublisherType, StreamSourceType};
