//! Monitoring registry implementation
//!
//! The entry point the rest of the server calls on host, application and
//! stream lifecycle events.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::info::{ApplicationInfo, HostId, HostInfo, StreamInfo};
use crate::stats::CounterBlock;

use super::application::ApplicationMetrics;
use super::config::MonitoringConfig;
use super::error::MonitoringError;
use super::host::HostMetrics;
use super::stream::StreamMetrics;

/// Registry of all monitored hosts
///
/// Created at server start and shared as `Arc<Monitoring>`. Each level of
/// the tree guards its own child map; counters are lock-free.
#[derive(Debug)]
pub struct Monitoring {
    /// Map of host id to host metrics
    hosts: RwLock<HashMap<HostId, Arc<HostMetrics>>>,

    /// Server-wide totals, fed by every host
    server: Arc<CounterBlock>,

    /// Configuration
    config: Arc<MonitoringConfig>,
}

impl Monitoring {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(MonitoringConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: MonitoringConfig) -> Self {
        Self {
            hosts: RwLock::new(HashMap::new()),
            server: Arc::new(CounterBlock::new()),
            config: Arc::new(config),
        }
    }

    /// Get the monitoring configuration
    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// Server-wide aggregate counters
    pub fn server_metrics(&self) -> &CounterBlock {
        &self.server
    }

    /// Register a host
    ///
    /// Registering an already known host is a no-op success.
    pub fn on_host_created(&self, info: &HostInfo) -> Result<(), MonitoringError> {
        let mut hosts = self.hosts.write();

        if hosts.contains_key(&info.id) {
            return Ok(());
        }

        hosts.try_reserve(1).map_err(|e| {
            tracing::error!(host = %info.name, error = %e, "Cannot create HostMetrics");
            e
        })?;
        let host = HostMetrics::new(
            info.clone(),
            Arc::clone(&self.server),
            Arc::clone(&self.config),
        );
        hosts.insert(info.id, host);

        tracing::info!(host = %info.name, "Create HostMetrics for monitoring");
        Ok(())
    }

    /// Unregister a host, dropping its applications and streams
    pub fn on_host_deleted(&self, info: &HostInfo) -> Result<(), MonitoringError> {
        let removed = self.hosts.write().remove(&info.id);

        let host = removed.ok_or(MonitoringError::HostNotFound(info.id))?;
        host.on_host_deleted();

        tracing::info!(host = %info.name, "Delete HostMetrics for monitoring");
        Ok(())
    }

    /// Register an application under its host
    pub fn on_application_created(&self, info: &ApplicationInfo) -> Result<(), MonitoringError> {
        self.resolve_host(info.host_info())?
            .on_application_created(info)
    }

    /// Unregister an application
    pub fn on_application_deleted(&self, info: &ApplicationInfo) -> Result<(), MonitoringError> {
        self.resolve_host(info.host_info())?
            .on_application_deleted(info)
    }

    /// Register a stream under its application
    pub fn on_stream_created(&self, info: &StreamInfo) -> Result<(), MonitoringError> {
        self.resolve_application(info.application_info())?
            .on_stream_created(info)
    }

    /// Unregister a stream
    pub fn on_stream_deleted(&self, info: &StreamInfo) -> Result<(), MonitoringError> {
        self.resolve_application(info.application_info())?
            .on_stream_deleted(info)
    }

    /// Look up a host's metrics
    pub fn host_metrics(&self, info: &HostInfo) -> Option<Arc<HostMetrics>> {
        self.hosts.read().get(&info.id).cloned()
    }

    /// Look up an application's metrics
    pub fn application_metrics(&self, info: &ApplicationInfo) -> Option<Arc<ApplicationMetrics>> {
        self.resolve_application(info).ok()
    }

    /// Look up a stream's metrics
    ///
    /// If the application is registered but the stream is not, the stream
    /// is registered on the spot. Missing hosts or applications are never
    /// created here.
    pub fn stream_metrics(&self, info: &StreamInfo) -> Option<Arc<StreamMetrics>> {
        let app = self.resolve_application(info.application_info()).ok()?;

        if let Some(stream) = app.stream_metrics(info) {
            return Some(stream);
        }

        tracing::debug!(stream = %info, "StreamMetrics not found, creating");
        match app.get_or_create_stream_metrics(info) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::error!(stream = %info, error = %e, "Cannot create StreamMetrics");
                None
            }
        }
    }

    /// All registered hosts
    pub fn hosts(&self) -> Vec<Arc<HostMetrics>> {
        self.hosts.read().values().cloned().collect()
    }

    /// Get total number of hosts
    pub fn host_count(&self) -> usize {
        self.hosts.read().len()
    }

    fn resolve_host(&self, info: &HostInfo) -> Result<Arc<HostMetrics>, MonitoringError> {
        self.host_metrics(info)
            .ok_or(MonitoringError::HostNotFound(info.id))
    }

    fn resolve_application(
        &self,
        info: &ApplicationInfo,
    ) -> Result<Arc<ApplicationMetrics>, MonitoringError> {
        self.resolve_host(info.host_info())?
            .application_metrics(info)
            .ok_or(MonitoringError::ApplicationNotFound(info.id))
    }

    /// Log every host, application and stream
    pub fn report(&self) {
        let snapshot = self.server.snapshot();
        tracing::info!(
            hosts = self.host_count(),
            bytes_in = snapshot.bytes_in,
            bytes_out = snapshot.total_bytes_out,
            connections = snapshot.total_connections,
            max_connections = snapshot.max_total_connections,
            "Server metrics"
        );

        for host in self.hosts() {
            host.show_info();
            for app in host.applications() {
                app.show_info();
                for stream in app.streams() {
                    stream.show_info();
                }
            }
        }
    }

    /// Spawn background report task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_report_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitoring = Arc::clone(self);
        let interval = monitoring.config.report_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                monitoring.report();
            }
        })
    }
}

impl Default for Monitoring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::info::{ApplicationId, PublisherType, StreamId, StreamSourceType};

    fn host_info() -> HostInfo {
        HostInfo::new(1, "default")
    }

    fn app_info() -> ApplicationInfo {
        ApplicationInfo::new(10, "live", host_info())
    }

    fn stream_info(id: u32) -> StreamInfo {
        StreamInfo::new(id, format!("stream_{id}"), app_info(), StreamSourceType::Rtmp)
    }

    fn populated() -> Monitoring {
        let monitoring = Monitoring::new();
        monitoring.on_host_created(&host_info()).unwrap();
        monitoring.on_application_created(&app_info()).unwrap();
        monitoring
    }

    #[test]
    fn test_host_created_is_idempotent() {
        let monitoring = Monitoring::new();

        monitoring.on_host_created(&host_info()).unwrap();
        let first = monitoring.host_metrics(&host_info()).unwrap();
        monitoring.on_host_created(&host_info()).unwrap();
        let second = monitoring.host_metrics(&host_info()).unwrap();

        assert_eq!(monitoring.host_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_host_deleted() {
        let monitoring = populated();

        monitoring.on_host_deleted(&host_info()).unwrap();

        assert!(monitoring.host_metrics(&host_info()).is_none());
        assert!(monitoring.application_metrics(&app_info()).is_none());
        assert_eq!(
            monitoring.on_host_deleted(&host_info()),
            Err(MonitoringError::HostNotFound(HostId(1)))
        );
    }

    #[test]
    fn test_application_requires_host() {
        let monitoring = Monitoring::new();

        let result = monitoring.on_application_created(&app_info());

        assert_eq!(result, Err(MonitoringError::HostNotFound(HostId(1))));
        assert_eq!(monitoring.host_count(), 0);
        assert!(monitoring.application_metrics(&app_info()).is_none());
    }

    #[test]
    fn test_stream_requires_application() {
        let monitoring = Monitoring::new();
        monitoring.on_host_created(&host_info()).unwrap();

        let result = monitoring.on_stream_created(&stream_info(100));

        assert_eq!(
            result,
            Err(MonitoringError::ApplicationNotFound(ApplicationId(10)))
        );
    }

    #[test]
    fn test_stream_lifecycle() {
        let monitoring = populated();

        monitoring.on_stream_created(&stream_info(100)).unwrap();
        monitoring.on_stream_created(&stream_info(100)).unwrap();
        let app = monitoring.application_metrics(&app_info()).unwrap();
        assert_eq!(app.stream_count(), 1);

        monitoring.on_stream_deleted(&stream_info(100)).unwrap();
        assert_eq!(app.stream_count(), 0);
        assert_eq!(
            monitoring.on_stream_deleted(&stream_info(100)),
            Err(MonitoringError::StreamNotFound(StreamId(100)))
        );
    }

    #[test]
    fn test_delete_absent_stream_leaves_others_untouched() {
        let monitoring = populated();
        monitoring.on_stream_created(&stream_info(100)).unwrap();
        let stream = monitoring.stream_metrics(&stream_info(100)).unwrap();
        stream.increase_bytes_in(7);

        assert!(monitoring.on_stream_deleted(&stream_info(999)).is_err());

        let stream = monitoring.stream_metrics(&stream_info(100)).unwrap();
        assert_eq!(stream.counters().bytes_in(), 7);
        let app = monitoring.application_metrics(&app_info()).unwrap();
        assert_eq!(app.stream_count(), 1);
        assert_eq!(app.counters().bytes_in(), 7);
    }

    #[test]
    fn test_stream_metrics_materializes_once() {
        let monitoring = populated();

        let first = monitoring.stream_metrics(&stream_info(100)).unwrap();
        let second = monitoring.stream_metrics(&stream_info(100)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let app = monitoring.application_metrics(&app_info()).unwrap();
        assert_eq!(app.stream_count(), 1);
    }

    #[test]
    fn test_stream_metrics_never_creates_ancestors() {
        let monitoring = Monitoring::new();
        assert!(monitoring.stream_metrics(&stream_info(100)).is_none());
        assert_eq!(monitoring.host_count(), 0);

        monitoring.on_host_created(&host_info()).unwrap();
        assert!(monitoring.stream_metrics(&stream_info(100)).is_none());
        let host = monitoring.host_metrics(&host_info()).unwrap();
        assert_eq!(host.application_count(), 0);
    }

    #[test]
    fn test_server_totals() {
        let monitoring = populated();
        let stream = monitoring.stream_metrics(&stream_info(100)).unwrap();

        stream.increase_bytes_out(PublisherType::WebRtc, 300);
        stream.on_session_connected(PublisherType::WebRtc);

        let server = monitoring.server_metrics();
        assert_eq!(server.bytes_out(PublisherType::WebRtc), 300);
        assert_eq!(server.total_connections(), 1);
    }

    #[test]
    fn test_report_does_not_panic() {
        let monitoring = populated();
        let pulled = StreamInfo::new(200, "pulled", app_info(), StreamSourceType::Ovt);
        let stream = monitoring.stream_metrics(&pulled).unwrap();
        stream.set_origin_request_time_msec(3.0);

        monitoring.report();
    }

    #[tokio::test]
    async fn test_report_task_can_be_aborted() {
        let config = MonitoringConfig::default().report_interval(Duration::from_millis(10));
        let monitoring = Arc::new(Monitoring::with_config(config));
        monitoring.on_host_created(&host_info()).unwrap();

        let handle = monitoring.spawn_report_task();
        tokio::time::sleep(Duration::from_millis(35)).await;
        handle.abort();

        let result = handle.await;
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(Arc::strong_count(&monitoring), 1);
    }
}
