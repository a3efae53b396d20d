// liveview-api: Async Rust client for Blink live-view sessions
//
// Two halves: the HTTPS command API (start, poll, stop) and the raw
// TLS video stream (auth handshake, keep-alive, relay to a sink).

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod transport;

pub use auth::{Credentials, DeviceFamily};
pub use client::{LiveViewApi, live_view_uri};
pub use connection::{ConnectionDescriptor, ConnectionStringError, parse_connection_string};
pub use error::Error;
pub use protocol::SessionAuth;
pub use session::{CommandStatus, STOPPED_CODE, SessionDescriptor};
pub use stream::{Dialer, StreamConfig, StreamHooks, TlsDialer};
pub use transport::{TlsMode, TransportConfig};
