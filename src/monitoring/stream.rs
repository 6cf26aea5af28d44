//! Per-stream metrics and origin forwarding
//!
//! Every counter event on a stream is applied locally and then pushed to
//! exactly one parent: the origin stream when the stream is derived from
//! one, otherwise the owning application. Only the root of an origin chain
//! reaches the application, so relayed bytes and viewers are counted once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::info::{PublisherType, StreamId, StreamInfo, StreamSourceType};
use crate::stats::{CounterBlock, CounterEvent, CounterSnapshot};

use super::application::ApplicationMetrics;

/// Metrics for a single live stream
#[derive(Debug)]
pub struct StreamMetrics {
    info: StreamInfo,
    counters: CounterBlock,

    /// Owning application, used for origin lookup and aggregation
    application: Weak<ApplicationMetrics>,

    /// f64 bit patterns, only meaningful for pulled streams
    origin_request_time_msec: AtomicU64,
    origin_response_time_msec: AtomicU64,
}

impl StreamMetrics {
    pub(super) fn new(info: StreamInfo, application: Weak<ApplicationMetrics>) -> Self {
        Self {
            info,
            counters: CounterBlock::new(),
            application,
            origin_request_time_msec: AtomicU64::new(0f64.to_bits()),
            origin_response_time_msec: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn id(&self) -> StreamId {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn source_type(&self) -> StreamSourceType {
        self.info.source_type
    }

    /// Identity of the origin stream, if this stream is derived
    pub fn origin_stream(&self) -> Option<StreamId> {
        self.info.origin_stream
    }

    /// This stream's own counters (including traffic of derived streams)
    pub fn counters(&self) -> &CounterBlock {
        &self.counters
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Owning application, if it is still registered
    pub fn application_metrics(&self) -> Option<Arc<ApplicationMetrics>> {
        self.application.upgrade()
    }

    pub fn increase_bytes_in(&self, n: u64) {
        self.record(CounterEvent::BytesIn(n));
    }

    pub fn increase_bytes_out(&self, ty: PublisherType, n: u64) {
        self.record(CounterEvent::BytesOut(ty, n));
    }

    pub fn on_session_connected(&self, ty: PublisherType) {
        self.record(CounterEvent::SessionConnected(ty));
    }

    pub fn on_session_disconnected(&self, ty: PublisherType) {
        self.record(CounterEvent::SessionDisconnected(ty));
    }

    /// Record a counter event on this stream and forward it upward
    pub fn record(&self, event: CounterEvent) {
        let mut visited = Vec::with_capacity(2);
        self.forward(event, &mut visited);
    }

    /// `visited` holds the streams this event has already been applied to
    fn forward(&self, event: CounterEvent, visited: &mut Vec<StreamId>) {
        if !self.counters.apply(event) {
            // Clamped disconnect: nothing changed here, so nothing moves upstream
            return;
        }
        visited.push(self.info.id);

        let Some(app) = self.application.upgrade() else {
            tracing::debug!(stream = %self.info, "Application gone, event kept on stream");
            return;
        };

        match self.info.origin_stream {
            Some(origin_id) => {
                if visited.contains(&origin_id) {
                    tracing::warn!(
                        stream = %self.info,
                        origin = %origin_id,
                        "Origin chain is cyclic, event not forwarded"
                    );
                    return;
                }
                if visited.len() > app.config().max_origin_depth {
                    tracing::warn!(
                        stream = %self.info,
                        origin = %origin_id,
                        depth = visited.len() - 1,
                        "Origin chain is too deep, event not forwarded"
                    );
                    return;
                }

                // The application lock is released before recursing
                match app.stream_metrics_by_id(origin_id) {
                    Some(origin) => origin.forward(event, visited),
                    None => {
                        tracing::debug!(
                            stream = %self.info,
                            origin = %origin_id,
                            "Origin stream not registered, event absorbed"
                        );
                    }
                }
            }
            None => {
                if event.is_session_event() && app.config().log_sessions {
                    self.log_session(event);
                }
                app.apply(event);
            }
        }
    }

    fn log_session(&self, event: CounterEvent) {
        match event {
            CounterEvent::SessionConnected(ty) => {
                tracing::info!(
                    stream = %self.info,
                    publisher = %ty,
                    connections = self.counters.connections(ty),
                    total = self.counters.total_connections(),
                    "Session started playing"
                );
            }
            CounterEvent::SessionDisconnected(ty) => {
                tracing::info!(
                    stream = %self.info,
                    publisher = %ty,
                    connections = self.counters.connections(ty),
                    total = self.counters.total_connections(),
                    "Session stopped playing"
                );
            }
            _ => {}
        }
    }

    /// Time taken to connect to the origin server, in milliseconds
    pub fn origin_request_time_msec(&self) -> f64 {
        f64::from_bits(self.origin_request_time_msec.load(Ordering::Relaxed))
    }

    /// Time taken for the origin server to respond, in milliseconds
    pub fn origin_response_time_msec(&self) -> f64 {
        f64::from_bits(self.origin_response_time_msec.load(Ordering::Relaxed))
    }

    pub fn set_origin_request_time_msec(&self, msec: f64) {
        self.origin_request_time_msec
            .store(msec.to_bits(), Ordering::Relaxed);
        self.counters.touch();
    }

    pub fn set_origin_response_time_msec(&self, msec: f64) {
        self.origin_response_time_msec
            .store(msec.to_bits(), Ordering::Relaxed);
        self.counters.touch();
    }

    /// Log the stream's counters
    pub fn show_info(&self) {
        let snapshot = self.snapshot();

        if self.info.source_type.is_pulled() {
            tracing::info!(
                stream = %self.info,
                source = %self.info.source_type,
                origin_request_ms = self.origin_request_time_msec(),
                origin_response_ms = self.origin_response_time_msec(),
                "Origin timing"
            );
        }

        tracing::info!(
            stream = %self.info,
            source = %self.info.source_type,
            origin = ?self.info.origin_stream,
            bytes_in = snapshot.bytes_in,
            bytes_out = snapshot.total_bytes_out,
            connections = snapshot.total_connections,
            max_connections = snapshot.max_total_connections,
            publishers = ?snapshot.active_publishers(),
            "Stream metrics"
        );
    }
}
