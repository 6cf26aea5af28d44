//! Per-host metrics

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::info::{ApplicationId, ApplicationInfo, HostId, HostInfo};
use crate::stats::{CounterBlock, CounterEvent, CounterSnapshot};

use super::application::ApplicationMetrics;
use super::config::MonitoringConfig;
use super::error::MonitoringError;

/// Metrics for a virtual host and the applications under it
#[derive(Debug)]
pub struct HostMetrics {
    info: HostInfo,
    counters: CounterBlock,

    /// Map of application id to application metrics
    applications: RwLock<HashMap<ApplicationId, Arc<ApplicationMetrics>>>,

    /// Server-wide totals
    server: Arc<CounterBlock>,

    config: Arc<MonitoringConfig>,

    this: Weak<HostMetrics>,
}

impl HostMetrics {
    pub(super) fn new(
        info: HostInfo,
        server: Arc<CounterBlock>,
        config: Arc<MonitoringConfig>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            info,
            counters: CounterBlock::new(),
            applications: RwLock::new(HashMap::new()),
            server,
            config,
            this: this.clone(),
        })
    }

    pub fn info(&self) -> &HostInfo {
        &self.info
    }

    pub fn id(&self) -> HostId {
        self.info.id
    }

    /// Aggregate counters of all applications
    pub fn counters(&self) -> &CounterBlock {
        &self.counters
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Register an application
    ///
    /// Registering an already known application is a no-op success.
    pub fn on_application_created(&self, info: &ApplicationInfo) -> Result<(), MonitoringError> {
        let app = {
            let mut applications = self.applications.write();
            if applications.contains_key(&info.id) {
                return Ok(());
            }

            applications.try_reserve(1)?;
            let app = ApplicationMetrics::new(
                info.clone(),
                self.this.clone(),
                Arc::clone(&self.config),
            );
            applications.insert(info.id, Arc::clone(&app));
            app
        };

        app.on_application_created();
        Ok(())
    }

    /// Unregister an application and drop its streams
    pub fn on_application_deleted(&self, info: &ApplicationInfo) -> Result<(), MonitoringError> {
        let removed = self.applications.write().remove(&info.id);

        match removed {
            Some(app) => {
                app.on_application_deleted();
                Ok(())
            }
            None => Err(MonitoringError::ApplicationNotFound(info.id)),
        }
    }

    /// Look up an application's metrics
    pub fn application_metrics(&self, info: &ApplicationInfo) -> Option<Arc<ApplicationMetrics>> {
        self.applications.read().get(&info.id).cloned()
    }

    /// All registered applications
    pub fn applications(&self) -> Vec<Arc<ApplicationMetrics>> {
        self.applications.read().values().cloned().collect()
    }

    pub fn application_count(&self) -> usize {
        self.applications.read().len()
    }

    /// Called by the registry once the host is unregistered
    pub(super) fn on_host_deleted(&self) {
        let applications = std::mem::take(&mut *self.applications.write());
        for app in applications.values() {
            app.on_application_deleted();
        }
    }

    pub(super) fn apply(&self, event: CounterEvent) {
        if self.counters.apply(event) {
            self.server.apply(event);
        }
    }

    /// Log the host's aggregate counters
    pub fn show_info(&self) {
        let snapshot = self.snapshot();

        tracing::info!(
            host = %self.info.name,
            applications = self.application_count(),
            bytes_in = snapshot.bytes_in,
            bytes_out = snapshot.total_bytes_out,
            connections = snapshot.total_connections,
            max_connections = snapshot.max_total_connections,
            "Host metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{PublisherType, StreamInfo, StreamSourceType};

    fn host_info() -> HostInfo {
        HostInfo::new(1, "default")
    }

    fn app_info(id: u32) -> ApplicationInfo {
        ApplicationInfo::new(id, format!("app_{id}"), host_info())
    }

    fn host() -> (Arc<CounterBlock>, Arc<HostMetrics>) {
        let server = Arc::new(CounterBlock::new());
        let host = HostMetrics::new(
            host_info(),
            Arc::clone(&server),
            Arc::new(MonitoringConfig::default()),
        );
        (server, host)
    }

    #[test]
    fn test_application_created_is_idempotent() {
        let (_server, host) = host();

        host.on_application_created(&app_info(10)).unwrap();
        let first = host.application_metrics(&app_info(10)).unwrap();
        host.on_application_created(&app_info(10)).unwrap();
        let second = host.application_metrics(&app_info(10)).unwrap();

        assert_eq!(host.application_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_delete_absent_application_fails() {
        let (_server, host) = host();
        host.on_application_created(&app_info(10)).unwrap();

        let result = host.on_application_deleted(&app_info(11));

        assert_eq!(
            result,
            Err(MonitoringError::ApplicationNotFound(ApplicationId(11)))
        );
        assert_eq!(host.application_count(), 1);
    }

    #[test]
    fn test_application_deleted_drops_streams() {
        let (_server, host) = host();
        host.on_application_created(&app_info(10)).unwrap();
        let app = host.application_metrics(&app_info(10)).unwrap();
        app.on_stream_created(&StreamInfo::new(1, "s", app_info(10), StreamSourceType::Rtmp))
            .unwrap();

        host.on_application_deleted(&app_info(10)).unwrap();

        assert!(host.application_metrics(&app_info(10)).is_none());
        assert_eq!(app.stream_count(), 0);
    }

    #[test]
    fn test_events_reach_host_and_server() {
        let (server, host) = host();
        host.on_application_created(&app_info(10)).unwrap();
        host.on_application_created(&app_info(11)).unwrap();

        let a = host.application_metrics(&app_info(10)).unwrap();
        let b = host.application_metrics(&app_info(11)).unwrap();
        a.increase_bytes_in(100);
        b.increase_bytes_in(50);
        b.on_session_connected(PublisherType::Hls);

        assert_eq!(host.counters().bytes_in(), 150);
        assert_eq!(host.counters().total_connections(), 1);
        assert_eq!(server.bytes_in(), 150);
        assert_eq!(server.connections(PublisherType::Hls), 1);
    }
}
