//! Monitoring error types
//!
//! Error types for lifecycle operations on the metrics tree.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::info::{ApplicationId, HostId, StreamId};

/// Error type for monitoring lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitoringError {
    /// Host is not registered
    #[error("Host not found: {0}")]
    HostNotFound(HostId),
    /// Application is not registered under its host
    #[error("Application not found: {0}")]
    ApplicationNotFound(ApplicationId),
    /// Stream is not registered under its application
    #[error("Stream not found: {0}")]
    StreamNotFound(StreamId),
    /// The child map could not grow to hold a new entry
    #[error("Cannot allocate metrics entry: {0}")]
    Allocation(#[from] TryReserveError),
}
