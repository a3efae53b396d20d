//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use liveview_config::ConfigError;
use liveview_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Usage ────────────────────────────────────────────────────────

    #[error("Missing required value for {flag}")]
    #[diagnostic(
        code(liveview::missing_argument),
        help(
            "Pass {flag} on the command line or set it in a config profile.\n\
             Run: liveview --help"
        )
    )]
    MissingArgument { flag: String },

    #[error("Unsupported device type '{device_type}'")]
    #[diagnostic(
        code(liveview::unsupported_device),
        help("Supported types: camera, owl, hawk, doorbell, lotus")
    )]
    UnsupportedDevice { device_type: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(liveview::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(liveview::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No API token for profile '{profile}'")]
    #[diagnostic(
        code(liveview::no_token),
        help(
            "Pass --token, set LIVEVIEW_TOKEN, or add token_env / token to the profile."
        )
    )]
    NoToken { profile: String },

    #[error("Failed to load configuration")]
    #[diagnostic(code(liveview::config))]
    Config(#[source] ConfigError),

    // ── Session ──────────────────────────────────────────────────────

    #[error("Could not start live view: {reason}")]
    #[diagnostic(
        code(liveview::session_start),
        help("Check the token, region and IDs. Tokens expire; log in again if needed.")
    )]
    SessionStart { reason: String },

    #[error("Stream server returned an unusable connection string")]
    #[diagnostic(code(liveview::connection_string))]
    ConnectionString {
        #[source]
        source: liveview_api::ConnectionStringError,
    },

    #[error("Live view ended: {reason}")]
    #[diagnostic(
        code(liveview::session_lost),
        help(
            "The camera or stream server dropped the session.\n\
             If the TLS handshake failed, try --insecure (-k)."
        )
    )]
    SessionLost { reason: String },

    #[error("Stream connection failed")]
    #[diagnostic(
        code(liveview::stream),
        help("If the TLS handshake failed, try --insecure (-k).")
    )]
    Stream {
        #[source]
        source: liveview_api::Error,
    },

    #[error("Timed out waiting for video after {seconds}s")]
    #[diagnostic(
        code(liveview::timeout),
        help("Increase the deadline with --connect-timeout.")
    )]
    Timeout { seconds: u64 },

    #[error("{message}")]
    #[diagnostic(code(liveview::internal))]
    Internal { message: String },

    // ── Output ───────────────────────────────────────────────────────

    #[error("Could not start ffplay")]
    #[diagnostic(
        code(liveview::player),
        help("Install ffmpeg (which provides ffplay) or write to a file with --output.")
    )]
    Player {
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingArgument { .. }
            | Self::UnsupportedDevice { .. }
            | Self::Validation { .. }
            | Self::ProfileNotFound { .. } => exit_code::USAGE,
            Self::NoToken { .. } | Self::SessionStart { .. } => exit_code::AUTH,
            Self::ConnectionString { .. } | Self::SessionLost { .. } | Self::Stream { .. } => {
                exit_code::CONNECTION
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::NoToken { profile } => CliError::NoToken { profile },
            other @ ConfigError::Figment(_) => CliError::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnsupportedDevice { device_type } => {
                CliError::UnsupportedDevice { device_type }
            }
            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },
            CoreError::SessionStart { reason } => CliError::SessionStart { reason },
            CoreError::InvalidConnectionString(source) => CliError::ConnectionString { source },
            CoreError::Stream(liveview_api::Error::ReadTimeout { timeout }) => CliError::Timeout {
                seconds: timeout.as_secs(),
            },
            CoreError::Stream(source) => CliError::Stream { source },
            CoreError::Poll { reason, .. } => CliError::SessionLost { reason },
            CoreError::SessionStop { message, .. } => CliError::SessionLost { reason: message },
            CoreError::AlreadyConnected | CoreError::Internal(_) => CliError::Internal {
                message: err.to_string(),
            },
        }
    }
}
