// ── Runtime session configuration ──
//
// Describes *how* a client talks to the vendor: timeouts and TLS trust.
// Never touches disk; the CLI builds a `ClientConfig` and hands it in.

use std::time::Duration;

use liveview_api::{StreamConfig, TlsMode, TransportConfig};

/// Configuration for one [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout applied to every session API call. Default: 10s.
    pub http_timeout: Duration,

    /// Skip certificate verification on the video stream. The vendor's
    /// stream servers present a private chain, so real sessions usually
    /// need this set.
    pub insecure_skip_verify: bool,

    /// Timing for the raw stream; `connect_timeout` also bounds dialing.
    pub stream: StreamConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(10),
            insecure_skip_verify: false,
            stream: StreamConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Override the first-read and dial deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.stream.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_insecure(mut self, insecure_skip_verify: bool) -> Self {
        self.insecure_skip_verify = insecure_skip_verify;
        self
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.http_timeout,
            stream_tls: TlsMode::from_insecure(self.insecure_skip_verify),
        }
    }
}
