//! Counter block shared by every monitored entity
//!
//! All fields are atomics so that data-plane threads can update counters
//! without taking the owning entity's map lock.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::info::PublisherType;

/// A single counter mutation
///
/// Streams forward these up their origin chain, so one event is applied
/// at several levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterEvent {
    /// Bytes received from the publisher/origin
    BytesIn(u64),
    /// Bytes sent to viewers of the given type
    BytesOut(PublisherType, u64),
    /// A viewer session started
    SessionConnected(PublisherType),
    /// A viewer session ended
    SessionDisconnected(PublisherType),
}

impl CounterEvent {
    /// Whether this event changes connection counts
    pub fn is_session_event(&self) -> bool {
        matches!(
            self,
            CounterEvent::SessionConnected(_) | CounterEvent::SessionDisconnected(_)
        )
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn from_millis(millis: u64) -> Option<SystemTime> {
    if millis == 0 {
        None
    } else {
        Some(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

/// Byte and session counters for one host, application or stream
#[derive(Debug)]
pub struct CounterBlock {
    created_at: SystemTime,
    last_updated: AtomicU64,
    last_recv: AtomicU64,
    last_sent: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: [AtomicU64; PublisherType::COUNT],
    total_bytes_out: AtomicU64,
    connections: [AtomicU32; PublisherType::COUNT],
    total_connections: AtomicU32,
    max_total_connections: AtomicU32,
    /// Guards peak updates so the peak and its time always move together
    max_total_connections_at: Mutex<u64>,
}

impl CounterBlock {
    /// Create a zeroed counter block
    pub fn new() -> Self {
        let now = now_millis();
        Self {
            created_at: SystemTime::now(),
            last_updated: AtomicU64::new(now),
            last_recv: AtomicU64::new(0),
            last_sent: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: std::array::from_fn(|_| AtomicU64::new(0)),
            total_bytes_out: AtomicU64::new(0),
            connections: std::array::from_fn(|_| AtomicU32::new(0)),
            total_connections: AtomicU32::new(0),
            max_total_connections: AtomicU32::new(0),
            max_total_connections_at: Mutex::new(0),
        }
    }

    /// Apply a counter event
    ///
    /// Returns `false` when the event was clamped and changed nothing, in
    /// which case it must not be forwarded to any parent.
    pub fn apply(&self, event: CounterEvent) -> bool {
        match event {
            CounterEvent::BytesIn(n) => self.increase_bytes_in(n),
            CounterEvent::BytesOut(ty, n) => self.increase_bytes_out(ty, n),
            CounterEvent::SessionConnected(ty) => self.on_session_connected(ty),
            CounterEvent::SessionDisconnected(ty) => return self.on_session_disconnected(ty),
        }
        true
    }

    pub fn increase_bytes_in(&self, n: u64) {
        self.bytes_in.fetch_add(n, Ordering::Relaxed);

        let now = now_millis();
        self.last_recv.store(now, Ordering::Relaxed);
        self.last_updated.store(now, Ordering::Relaxed);
    }

    pub fn increase_bytes_out(&self, ty: PublisherType, n: u64) {
        self.bytes_out[ty.index()].fetch_add(n, Ordering::Relaxed);
        self.total_bytes_out.fetch_add(n, Ordering::Relaxed);

        let now = now_millis();
        self.last_sent.store(now, Ordering::Relaxed);
        self.last_updated.store(now, Ordering::Relaxed);
    }

    /// Record a new viewer session of type `ty`
    pub fn on_session_connected(&self, ty: PublisherType) {
        // Total goes up before the bucket so total >= sum(buckets) between the two steps
        let total = self.total_connections.fetch_add(1, Ordering::AcqRel) + 1;
        self.connections[ty.index()].fetch_add(1, Ordering::AcqRel);

        let now = now_millis();
        if total > self.max_total_connections.load(Ordering::Acquire) {
            let mut peak_at = self.max_total_connections_at.lock();
            if total > self.max_total_connections.load(Ordering::Acquire) {
                self.max_total_connections.store(total, Ordering::Release);
                *peak_at = now;
            }
        }
        self.last_updated.store(now, Ordering::Relaxed);
    }

    /// Record the end of a viewer session of type `ty`
    ///
    /// A disconnect for a type with no recorded connections is clamped: the
    /// counters stay at zero, a warning is logged and `false` is returned.
    pub fn on_session_disconnected(&self, ty: PublisherType) -> bool {
        let bucket = &self.connections[ty.index()];
        if bucket
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_err()
        {
            tracing::warn!(
                publisher = %ty,
                "Session disconnected with no recorded connections, ignoring"
            );
            return false;
        }

        // The bucket was non-zero, so the matching total increment already happened
        let total = self.total_connections.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |n| n.checked_sub(1),
        );
        if total.is_err() {
            tracing::warn!(
                publisher = %ty,
                "Total connections already zero while bucket was not"
            );
        }

        self.last_updated.store(now_millis(), Ordering::Relaxed);
        true
    }

    /// Touch the last-updated time without changing any counter
    pub fn touch(&self) {
        self.last_updated.store(now_millis(), Ordering::Relaxed);
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn last_updated(&self) -> SystemTime {
        from_millis(self.last_updated.load(Ordering::Relaxed)).unwrap_or(self.created_at)
    }

    /// Time of the most recent bytes-in event
    pub fn last_recv_time(&self) -> Option<SystemTime> {
        from_millis(self.last_recv.load(Ordering::Relaxed))
    }

    /// Time of the most recent bytes-out event
    pub fn last_sent_time(&self) -> Option<SystemTime> {
        from_millis(self.last_sent.load(Ordering::Relaxed))
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.load(Ordering::Relaxed)
    }

    pub fn bytes_out(&self, ty: PublisherType) -> u64 {
        self.bytes_out[ty.index()].load(Ordering::Relaxed)
    }

    pub fn total_bytes_out(&self) -> u64 {
        self.total_bytes_out.load(Ordering::Relaxed)
    }

    pub fn connections(&self, ty: PublisherType) -> u32 {
        self.connections[ty.index()].load(Ordering::Acquire)
    }

    pub fn total_connections(&self) -> u32 {
        self.total_connections.load(Ordering::Acquire)
    }

    /// Highest concurrent connection count seen so far
    pub fn max_total_connections(&self) -> u32 {
        self.max_total_connections.load(Ordering::Acquire)
    }

    /// When the connection peak was reached
    pub fn max_total_connections_time(&self) -> Option<SystemTime> {
        from_millis(*self.max_total_connections_at.lock())
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            created_at: self.created_at,
            last_updated: self.last_updated(),
            last_recv_time: self.last_recv_time(),
            last_sent_time: self.last_sent_time(),
            bytes_in: self.bytes_in(),
            bytes_out: std::array::from_fn(|i| self.bytes_out[i].load(Ordering::Relaxed)),
            total_bytes_out: self.total_bytes_out(),
            connections: std::array::from_fn(|i| self.connections[i].load(Ordering::Acquire)),
            total_connections: self.total_connections(),
            max_total_connections: self.max_total_connections(),
            max_total_connections_time: self.max_total_connections_time(),
        }
    }
}

impl Default for CounterBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of a [`CounterBlock`] for reporting
#[derive(Debug, Clone)]
pub struct CounterSnapshot {
    pub created_at: SystemTime,
    pub last_updated: SystemTime,
    pub last_recv_time: Option<SystemTime>,
    pub last_sent_time: Option<SystemTime>,
    pub bytes_in: u64,
    /// Bytes out, indexed in [`PublisherType::ALL`] order
    pub bytes_out: [u64; PublisherType::COUNT],
    pub total_bytes_out: u64,
    /// Active connections, indexed in [`PublisherType::ALL`] order
    pub connections: [u32; PublisherType::COUNT],
    pub total_connections: u32,
    pub max_total_connections: u32,
    pub max_total_connections_time: Option<SystemTime>,
}

impl CounterSnapshot {
    pub fn bytes_out(&self, ty: PublisherType) -> u64 {
        self.bytes_out[ty.index()]
    }

    pub fn connections(&self, ty: PublisherType) -> u32 {
        self.connections[ty.index()]
    }

    /// Non-zero connection buckets, for compact logging
    pub fn active_publishers(&self) -> Vec<(PublisherType, u32)> {
        PublisherType::ALL
            .iter()
            .map(|ty| (*ty, self.connections(*ty)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    /// Time since the block was created
    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed().unwrap_or_default()
    }
}
