//! Source and publisher type tags

/// Where a stream's media is coming from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSourceType {
    /// Published over RTMP
    Rtmp,
    /// Published over WebRTC (WHIP)
    WebRtc,
    /// Published over SRT
    Srt,
    /// MPEG-TS over UDP
    MpegTs,
    /// Pushed by an RTSP client
    RtspPush,
    /// Pulled from a remote RTSP server
    RtspPull,
    /// Pulled from another media server over OVT
    Ovt,
    /// Read from a local file
    File,
    /// Produced by the transcoder from another stream
    Transcoder,
}

impl StreamSourceType {
    /// Whether the stream is pulled from a remote origin server
    ///
    /// Only these streams have meaningful origin request/response timings.
    pub fn is_pulled(&self) -> bool {
        matches!(self, Self::RtspPull | Self::Ovt)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rtmp => "rtmp",
            Self::WebRtc => "webrtc",
            Self::Srt => "srt",
            Self::MpegTs => "mpegts",
            Self::RtspPush => "rtsp-push",
            Self::RtspPull => "rtsp-pull",
            Self::Ovt => "ovt",
            Self::File => "file",
            Self::Transcoder => "transcoder",
        }
    }
}

impl std::fmt::Display for StreamSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output protocol a viewer session is using
///
/// Used as the bucketing key for per-protocol counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublisherType {
    WebRtc,
    Rtmp,
    RtmpPush,
    Hls,
    LlHls,
    Dash,
    LlDash,
    Srt,
    Ovt,
    File,
    Thumbnail,
}

impl PublisherType {
    /// Number of publisher types
    pub const COUNT: usize = 11;

    /// Every publisher type, in bucket order
    pub const ALL: [PublisherType; Self::COUNT] = [
        Self::WebRtc,
        Self::Rtmp,
        Self::RtmpPush,
        Self::Hls,
        Self::LlHls,
        Self::Dash,
        Self::LlDash,
        Self::Srt,
        Self::Ovt,
        Self::File,
        Self::Thumbnail,
    ];

    /// Bucket index of this type
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebRtc => "webrtc",
            Self::Rtmp => "rtmp",
            Self::RtmpPush => "rtmp-push",
            Self::Hls => "hls",
            Self::LlHls => "llhls",
            Self::Dash => "dash",
            Self::LlDash => "lldash",
            Self::Srt => "srt",
            Self::Ovt => "ovt",
            Self::File => "file",
            Self::Thumbnail => "thumbnail",
        }
    }
}

impl std::fmt::Display for PublisherType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
