use thiserror::Error;

use crate::connection::ConnectionStringError;

/// Top-level error type for the `liveview-api` crate.
///
/// Covers every failure mode across the session API and the raw stream:
/// configuration, connection-string parsing, the HTTPS command lifecycle,
/// and the TLS video transport. `liveview-core` maps these into
/// user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// The device-family tag matches none of the known URL templates.
    #[error("Unsupported device type: {device_type}")]
    UnsupportedDevice { device_type: String },

    /// The bearer token cannot be carried in an HTTP header.
    #[error("API token contains characters not allowed in a header")]
    InvalidToken,

    // ── Protocol string ─────────────────────────────────────────────
    /// The `server` field of the session descriptor could not be parsed.
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(#[from] ConnectionStringError),

    // ── Session API ─────────────────────────────────────────────────
    /// Starting the live-view session failed (transport, status, body, or zero id).
    #[error("Failed to start live-view session: {reason}")]
    SessionStart { reason: String },

    /// A keep-alive poll of the session command failed.
    #[error("Failed to poll command {command_id}: {reason}")]
    Poll { command_id: u64, reason: String },

    /// The far end marked the command as complete; it cannot be polled further.
    #[error("Command {command_id} marked as complete")]
    SessionComplete { command_id: u64 },

    /// Stopping the session did not return the "stopped" code.
    #[error("Failed to stop live-view session: {message}")]
    SessionStop { code: Option<i64>, message: String },

    // ── HTTP plumbing ───────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or handshake error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Stream transport ────────────────────────────────────────────
    /// Could not open the TCP/TLS session to the stream server.
    #[error("Unable to initialize stream to {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The stream server closed the connection gracefully.
    #[error("Connection closed gracefully by peer")]
    PeerClosed,

    /// The stream server reset the connection.
    #[error("Connection reset by peer: {0}")]
    PeerReset(#[source] std::io::Error),

    /// No data arrived within the current read deadline.
    #[error("Read timeout after {}ms", timeout.as_millis())]
    ReadTimeout { timeout: std::time::Duration },

    /// Any other I/O failure on the stream connection.
    #[error("Stream I/O error: {0}")]
    StreamIo(#[source] std::io::Error),

    /// Writing received bytes to the local sink failed.
    #[error("Error writing to sink: {0}")]
    Sink(#[source] std::io::Error),
}

impl Error {
    /// Returns `true` if the far end ended the session on its own.
    pub fn is_session_complete(&self) -> bool {
        matches!(self, Self::SessionComplete { .. })
    }

    /// Extract the vendor command code, if available.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::SessionStop { code, .. } => *code,
            _ => None,
        }
    }
}
