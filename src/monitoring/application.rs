//! Per-application metrics

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::info::{ApplicationId, ApplicationInfo, PublisherType, StreamId, StreamInfo};
use crate::stats::{CounterBlock, CounterEvent, CounterSnapshot};

use super::config::MonitoringConfig;
use super::error::MonitoringError;
use super::host::HostMetrics;
use super::stream::StreamMetrics;

/// Metrics for an application and the streams under it
///
/// The application's counters only aggregate origin streams; derived
/// streams reach it through their origin.
#[derive(Debug)]
pub struct ApplicationMetrics {
    info: ApplicationInfo,
    counters: CounterBlock,

    /// Map of stream id to stream metrics
    streams: RwLock<HashMap<StreamId, Arc<StreamMetrics>>>,

    /// Owning host, receives every aggregated event
    host: Weak<HostMetrics>,

    config: Arc<MonitoringConfig>,

    /// Handed to new streams as their back-reference
    this: Weak<ApplicationMetrics>,
}

impl ApplicationMetrics {
    pub(super) fn new(
        info: ApplicationInfo,
        host: Weak<HostMetrics>,
        config: Arc<MonitoringConfig>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            info,
            counters: CounterBlock::new(),
            streams: RwLock::new(HashMap::new()),
            host,
            config,
            this: this.clone(),
        })
    }

    pub fn info(&self) -> &ApplicationInfo {
        &self.info
    }

    pub fn id(&self) -> ApplicationId {
        self.info.id
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// Aggregate counters of all origin streams
    pub fn counters(&self) -> &CounterBlock {
        &self.counters
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Owning host, if it is still registered
    pub fn host_metrics(&self) -> Option<Arc<HostMetrics>> {
        self.host.upgrade()
    }

    /// Called by the host once the application is registered
    pub fn on_application_created(&self) {
        tracing::info!(app = %self.info, "Create ApplicationMetrics for monitoring");
    }

    /// Called by the host once the application is unregistered
    ///
    /// Drops every stream entry of the application.
    pub fn on_application_deleted(&self) {
        let streams = std::mem::take(&mut *self.streams.write());

        tracing::info!(
            app = %self.info,
            streams = streams.len(),
            "Delete ApplicationMetrics for monitoring"
        );
    }

    /// Register a stream
    ///
    /// Registering an already known stream is a no-op success.
    pub fn on_stream_created(&self, info: &StreamInfo) -> Result<(), MonitoringError> {
        self.get_or_create_stream_metrics(info).map(|_| ())
    }

    /// Unregister a stream
    pub fn on_stream_deleted(&self, info: &StreamInfo) -> Result<(), MonitoringError> {
        let removed = self.streams.write().remove(&info.id);

        match removed {
            Some(_) => {
                tracing::info!(stream = %info, "Delete StreamMetrics for monitoring");
                Ok(())
            }
            None => Err(MonitoringError::StreamNotFound(info.id)),
        }
    }

    /// Look up a stream's metrics
    pub fn stream_metrics(&self, info: &StreamInfo) -> Option<Arc<StreamMetrics>> {
        self.stream_metrics_by_id(info.id)
    }

    /// Look up a stream's metrics by id
    pub fn stream_metrics_by_id(&self, id: StreamId) -> Option<Arc<StreamMetrics>> {
        self.streams.read().get(&id).cloned()
    }

    /// Return the stream's metrics, registering the stream first if needed
    pub(super) fn get_or_create_stream_metrics(
        &self,
        info: &StreamInfo,
    ) -> Result<Arc<StreamMetrics>, MonitoringError> {
        let mut streams = self.streams.write();

        if let Some(existing) = streams.get(&info.id) {
            return Ok(Arc::clone(existing));
        }

        streams.try_reserve(1)?;
        let metrics = Arc::new(StreamMetrics::new(info.clone(), self.this.clone()));
        streams.insert(info.id, Arc::clone(&metrics));

        tracing::info!(
            stream = %info,
            source = %info.source_type,
            origin = ?info.origin_stream,
            "Create StreamMetrics for monitoring"
        );

        Ok(metrics)
    }

    /// All registered streams
    pub fn streams(&self) -> Vec<Arc<StreamMetrics>> {
        self.streams.read().values().cloned().collect()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.read().len()
    }

    pub fn increase_bytes_in(&self, n: u64) {
        self.apply(CounterEvent::BytesIn(n));
    }

    pub fn increase_bytes_out(&self, ty: PublisherType, n: u64) {
        self.apply(CounterEvent::BytesOut(ty, n));
    }

    pub fn on_session_connected(&self, ty: PublisherType) {
        self.apply(CounterEvent::SessionConnected(ty));
    }

    pub fn on_session_disconnected(&self, ty: PublisherType) {
        self.apply(CounterEvent::SessionDisconnected(ty));
    }

    /// Apply an aggregated event and pass it to the host
    pub(super) fn apply(&self, event: CounterEvent) {
        if !self.counters.apply(event) {
            return;
        }

        if let Some(host) = self.host.upgrade() {
            host.apply(event);
        }
    }

    /// Log the application's aggregate counters
    pub fn show_info(&self) {
        let snapshot = self.snapshot();

        tracing::info!(
            app = %self.info,
            streams = self.stream_count(),
            bytes_in = snapshot.bytes_in,
            bytes_out = snapshot.total_bytes_out,
            connections = snapshot.total_connections,
            max_connections = snapshot.max_total_connections,
            publishers = ?snapshot.active_publishers(),
            "Application metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{HostInfo, StreamSourceType};

    fn app_info() -> ApplicationInfo {
        ApplicationInfo::new(10, "live", HostInfo::new(1, "default"))
    }

    fn stream_info(id: u32) -> StreamInfo {
        StreamInfo::new(id, format!("stream_{id}"), app_info(), StreamSourceType::Rtmp)
    }

    fn detached_app() -> Arc<ApplicationMetrics> {
        ApplicationMetrics::new(app_info(), Weak::new(), Arc::new(MonitoringConfig::default()))
    }

    #[test]
    fn test_stream_created_is_idempotent() {
        let app = detached_app();
        let info = stream_info(100);

        app.on_stream_created(&info).unwrap();
        let first = app.stream_metrics(&info).unwrap();
        app.on_stream_created(&info).unwrap();
        let second = app.stream_metrics(&info).unwrap();

        assert_eq!(app.stream_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_stream_deleted() {
        let app = detached_app();
        let info = stream_info(100);

        app.on_stream_created(&info).unwrap();
        app.on_stream_deleted(&info).unwrap();

        assert!(app.stream_metrics(&info).is_none());
        assert_eq!(app.stream_count(), 0);
    }

    #[test]
    fn test_delete_absent_stream_fails() {
        let app = detached_app();
        app.on_stream_created(&stream_info(100)).unwrap();

        let result = app.on_stream_deleted(&stream_info(200));

        assert_eq!(result, Err(MonitoringError::StreamNotFound(StreamId(200))));
        assert_eq!(app.stream_count(), 1);
    }

    #[test]
    fn test_stream_lookup_has_no_side_effects() {
        let app = detached_app();

        assert!(app.stream_metrics(&stream_info(100)).is_none());
        assert_eq!(app.stream_count(), 0);
    }

    #[test]
    fn test_stream_back_reference() {
        let app = detached_app();
        app.on_stream_created(&stream_info(100)).unwrap();

        let stream = app.stream_metrics_by_id(StreamId(100)).unwrap();
        let owner = stream.application_metrics().unwrap();

        assert!(Arc::ptr_eq(&owner, &app));
    }

    #[test]
    fn test_application_deleted_drops_streams() {
        let app = detached_app();
        app.on_stream_created(&stream_info(100)).unwrap();
        app.on_stream_created(&stream_info(101)).unwrap();

        app.on_application_deleted();

        assert_eq!(app.stream_count(), 0);
    }

    #[test]
    fn test_direct_aggregate_entry_points() {
        let app = detached_app();

        app.increase_bytes_in(10);
        app.increase_bytes_out(PublisherType::Dash, 20);
        app.on_session_connected(PublisherType::Dash);

        assert_eq!(app.counters().bytes_in(), 10);
        assert_eq!(app.counters().bytes_out(PublisherType::Dash), 20);
        assert_eq!(app.counters().total_connections(), 1);

        app.on_session_disconnected(PublisherType::Dash);
        assert_eq!(app.counters().total_connections(), 0);
    }
}
