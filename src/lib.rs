//! Metrics aggregation for live media servers
//!
//! Tracks bytes in/out and active viewer sessions for every host,
//! application and stream a server is serving, with per-protocol buckets.
//! Relayed streams are attributed to their origin so aggregates never
//! double count.
//!
//! ```
//! use stream_monitoring::info::{ApplicationInfo, HostInfo, PublisherType, StreamInfo, StreamSourceType};
//! use stream_monitoring::Monitoring;
//!
//! let monitoring = Monitoring::new();
//! let host = HostInfo::new(1, "default");
//! let app = ApplicationInfo::new(1, "live", host.clone());
//! let origin = StreamInfo::new(1, "cam", app.clone(), StreamSourceType::Rtmp);
//! let relay = StreamInfo::new(2, "cam_relay", app.clone(), StreamSourceType::Transcoder).with_origin(1);
//!
//! monitoring.on_host_created(&host).unwrap();
//! monitoring.on_application_created(&app).unwrap();
//! monitoring.on_stream_created(&origin).unwrap();
//! monitoring.on_stream_created(&relay).unwrap();
//!
//! let relay_metrics = monitoring.stream_metrics(&relay).unwrap();
//! relay_metrics.on_session_connected(PublisherType::Hls);
//!
//! let app_metrics = monitoring.application_metrics(&app).unwrap();
//! assert_eq!(app_metrics.counters().total_connections(), 1);
//! ```

pub mod info;
pub mod monitoring;
pub mod stats;

pub use info::{ApplicationInfo, HostInfo, PublisherType, StreamInfo, StreamSourceType};
pub use monitoring::{
    ApplicationMetrics, HostMetrics, Monitoring, MonitoringConfig, MonitoringError,
    StreamMetrics,
};
pub use stats::{CounterBlock, CounterEvent, CounterSnapshot};
