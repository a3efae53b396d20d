// ── Core error types ──
//
// User-facing errors from liveview-core. The `From<liveview_api::Error>`
// impl folds transport-layer detail into the few outcomes a caller acts on.

use thiserror::Error;

use liveview_api::ConnectionStringError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Already connected: disconnect before starting a new session")]
    AlreadyConnected,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Unsupported device type: {device_type}")]
    UnsupportedDevice { device_type: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Session API errors ───────────────────────────────────────────
    #[error("Failed to start live-view session: {reason}")]
    SessionStart { reason: String },

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(ConnectionStringError),

    #[error("Failed to poll command {command_id}: {reason}")]
    Poll { command_id: u64, reason: String },

    #[error("Failed to stop live-view session: {message}")]
    SessionStop { code: Option<i64>, message: String },

    // ── Stream errors ────────────────────────────────────────────────
    #[error("Stream error: {0}")]
    Stream(#[source] liveview_api::Error),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<liveview_api::Error> for CoreError {
    fn from(err: liveview_api::Error) -> Self {
        use liveview_api::Error as Api;

        match err {
            Api::UnsupportedDevice { device_type } => CoreError::UnsupportedDevice { device_type },
            Api::InvalidToken => CoreError::Config {
                message: "API token contains characters not allowed in a header".into(),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::InvalidConnectionString(e) => CoreError::InvalidConnectionString(e),
            Api::SessionStart { reason } => CoreError::SessionStart { reason },
            Api::Poll { command_id, reason } => CoreError::Poll { command_id, reason },
            Api::SessionComplete { command_id } => CoreError::Poll {
                command_id,
                reason: "session marked as complete".into(),
            },
            Api::SessionStop { code, message } => CoreError::SessionStop { code, message },
            Api::Http(e) => CoreError::Config {
                message: format!("HTTP client setup failed: {e}"),
            },
            Api::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            e @ (Api::Dial { .. }
            | Api::PeerClosed
            | Api::PeerReset(_)
            | Api::ReadTimeout { .. }
            | Api::StreamIo(_)
            | Api::Sink(_)) => CoreError::Stream(e),
        }
    }
}
