//! Relay topology walkthrough
//!
//! Run with: cargo run --example relay_topology
//!
//! Builds one host with an RTMP origin stream and an OVT relay of it,
//! simulates a few viewers on each and prints the resulting counters.
//! Set RUST_LOG=debug to see stale-origin and lazy-creation events.

use std::sync::Arc;
use std::time::Duration;

use stream_monitoring::{
    ApplicationInfo, HostInfo, Monitoring, MonitoringConfig, PublisherType, StreamInfo,
    StreamSourceType,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = MonitoringConfig::default().report_interval(Duration::from_secs(1));
    let monitoring = Arc::new(Monitoring::with_config(config));

    let host = HostInfo::new(1, "default");
    let app = ApplicationInfo::new(1, "live", host.clone());
    let origin = StreamInfo::new(1, "cam", app.clone(), StreamSourceType::Rtmp);
    let relay = StreamInfo::new(2, "cam_edge", app.clone(), StreamSourceType::Ovt).with_origin(1);

    monitoring.on_host_created(&host).unwrap();
    monitoring.on_application_created(&app).unwrap();
    monitoring.on_stream_created(&origin).unwrap();

    let reporter = monitoring.spawn_report_task();

    let origin_metrics = monitoring.stream_metrics(&origin).unwrap();
    // Never explicitly created; materialized on first lookup
    let relay_metrics = monitoring.stream_metrics(&relay).unwrap();
    relay_metrics.set_origin_request_time_msec(12.0);
    relay_metrics.set_origin_response_time_msec(48.5);

    for second in 0..3u64 {
        origin_metrics.increase_bytes_in(250_000);
        origin_metrics.on_session_connected(PublisherType::WebRtc);
        relay_metrics.on_session_connected(PublisherType::LlHls);
        relay_metrics.increase_bytes_out(PublisherType::LlHls, 100_000 * (second + 1));
        tokio::time::sleep(Duration::from_millis(1100)).await;
    }

    relay_metrics.on_session_disconnected(PublisherType::LlHls);
    reporter.abort();

    let app_metrics = monitoring.application_metrics(&app).unwrap();
    let snapshot = app_metrics.snapshot();
    println!(
        "app {}: in={} out={} viewers={} (peak {})",
        app,
        snapshot.bytes_in,
        snapshot.total_bytes_out,
        snapshot.total_connections,
        snapshot.max_total_connections,
    );
    for ty in PublisherType::ALL {
        let n = snapshot.connections(ty);
        if n > 0 {
            println!("  {ty}: {n} viewers, {} bytes out", snapshot.bytes_out(ty));
        }
    }

    monitoring.on_host_deleted(&host).unwrap();
}
