// Connection string parsing.
//
// The start-session response names the stream server with an opaque URI
// such as `immis://1.2.3.4:443/AbCdEf_1234?client_id=987`. Everything the
// raw stream needs (host, port, client id, connection id) is encoded there.

use thiserror::Error;
use url::Url;

/// The only port the stream servers listen on.
pub const STREAM_PORT: u16 = 443;

/// Why a connection string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionStringError {
    #[error("not a valid URI: {0}")]
    Malformed(String),

    #[error("invalid host")]
    BadHost,

    #[error("unexpected port {port:?}, expecting 443")]
    BadPort { port: Option<u16> },

    #[error("invalid connection ID in path")]
    BadPath,

    #[error("invalid client ID")]
    BadClientId,
}

/// Host, port and identifiers needed to open the raw video session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    /// Per-connection client id, sent big-endian in the handshake.
    pub client_id: u32,
    /// Leading part of the last path segment, sent verbatim in the handshake.
    pub connection_id: String,
}

impl ConnectionDescriptor {
    /// `host:port`, suitable for dialing.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::str::FromStr for ConnectionDescriptor {
    type Err = ConnectionStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_connection_string(s)
    }
}

/// Parse the `server` field of a session descriptor.
///
/// Checks run in order: host, port, path, client id.
pub fn parse_connection_string(server: &str) -> Result<ConnectionDescriptor, ConnectionStringError> {
    let url = Url::parse(server).map_err(|e| ConnectionStringError::Malformed(e.to_string()))?;

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_owned(),
        _ => return Err(ConnectionStringError::BadHost),
    };

    let port = written_port(server, &url);
    if port != Some(STREAM_PORT) {
        return Err(ConnectionStringError::BadPort { port });
    }

    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .ok_or(ConnectionStringError::BadPath)?;
    let connection_id = match last_segment.split_once('_') {
        Some((id, _)) if !id.is_empty() => id.to_owned(),
        _ => return Err(ConnectionStringError::BadPath),
    };

    let client_id = url
        .query_pairs()
        .find(|(key, _)| key == "client_id")
        .and_then(|(_, value)| value.parse::<u32>().ok())
        .filter(|id| *id != 0)
        .ok_or(ConnectionStringError::BadClientId)?;

    Ok(ConnectionDescriptor {
        host,
        port: STREAM_PORT,
        client_id,
        connection_id,
    })
}

/// Port exactly as written in the authority.
///
/// `Url` drops a port equal to the scheme default, so `https://h:443/..`
/// reads back as `None`; recover it from the raw text in that case.
fn written_port(server: &str, url: &Url) -> Option<u16> {
    url.port().or_else(|| {
        let (_, rest) = server.split_once("://")?;
        let authority = rest.split(['/', '?', '#']).next()?;
        let (_, port) = authority.rsplit_once(':')?;
        port.parse().ok()
    })
}
