// liveview-core: Session lifecycle between liveview-api and consumers (CLI).

pub mod client;
pub mod config;
pub mod error;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{Client, ConnectionState, SessionEvent};
pub use config::ClientConfig;
pub use error::CoreError;

// Types consumers need to build a client without depending on liveview-api.
pub use liveview_api::{Credentials, StreamConfig};
