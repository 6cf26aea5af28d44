//! Host, application and stream descriptors
//!
//! These are handed to the monitoring layer by the rest of the server on
//! lifecycle and counter events. They are only used to resolve identities.

use super::types::StreamSourceType;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Stable identity of a virtual host
    HostId
);
id_type!(
    /// Stable identity of an application, unique within the server
    ApplicationId
);
id_type!(
    /// Stable identity of a stream, unique within its application
    StreamId
);

/// Virtual host descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// Host identity
    pub id: HostId,
    /// Display name (e.g., "default")
    pub name: String,
}

impl HostInfo {
    /// Create a new host descriptor
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: HostId(id),
            name: name.into(),
        }
    }
}

/// Application descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    /// Application identity
    pub id: ApplicationId,
    /// Display name (e.g., "live")
    pub name: String,
    /// Owning host
    pub host: HostInfo,
}

impl ApplicationInfo {
    /// Create a new application descriptor under `host`
    pub fn new(id: u32, name: impl Into<String>, host: HostInfo) -> Self {
        Self {
            id: ApplicationId(id),
            name: name.into(),
            host,
        }
    }

    /// Owning host descriptor
    pub fn host_info(&self) -> &HostInfo {
        &self.host
    }
}

impl std::fmt::Display for ApplicationInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.host.name, self.name)
    }
}

/// Stream descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Stream identity
    pub id: StreamId,
    /// Display name (e.g., "stream_key_123")
    pub name: String,
    /// Owning application
    pub application: ApplicationInfo,
    /// Where the stream's media comes from
    pub source_type: StreamSourceType,
    /// Stream this one is derived from, if any
    pub origin_stream: Option<StreamId>,
}

impl StreamInfo {
    /// Create a locally originated stream descriptor
    pub fn new(
        id: u32,
        name: impl Into<String>,
        application: ApplicationInfo,
        source_type: StreamSourceType,
    ) -> Self {
        Self {
            id: StreamId(id),
            name: name.into(),
            application,
            source_type,
            origin_stream: None,
        }
    }

    /// Mark this stream as derived from `origin`
    pub fn with_origin(mut self, origin: u32) -> Self {
        self.origin_stream = Some(StreamId(origin));
        self
    }

    /// Owning application descriptor
    pub fn application_info(&self) -> &ApplicationInfo {
        &self.application
    }

    /// Identity of the stream this one is derived from
    pub fn origin_stream(&self) -> Option<StreamId> {
        self.origin_stream
    }
}

impl std::fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.application, self.name)
    }
}
