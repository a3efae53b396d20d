//! Raw video stream over TCP/TLS.
//!
//! Opens the stream session, writes the authentication handshake, then
//! relays every byte the server sends into a caller-supplied sink until the
//! cancellation token fires or the connection fails. Keep-alive frames are
//! interleaved with reads on the same task.
//!
//! # Example
//!
//! ```rust,ignore
//! use liveview_api::{parse_connection_string, SessionAuth, StreamConfig, TlsDialer};
//! use liveview_api::stream;
//! use tokio_util::sync::CancellationToken;
//!
//! let desc = parse_connection_string(&session.server)?;
//! let dialer = TlsDialer::new(&transport, config.connect_timeout)?;
//! let cancel = CancellationToken::new();
//!
//! let mut out = tokio::io::stdout();
//! stream::stream(&dialer, &desc.host, desc.port, &mut out, &cancel, &config, &SessionAuth::from(&desc)).await?;
//! ```

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::transport::TransportConfig;

// ── Hooks ────────────────────────────────────────────────────────────

/// Frames the stream writes on its own: once after connecting, then
/// periodically as a keep-alive.
pub trait StreamHooks: Send + Sync {
    /// Blocks written in order, one write each, before the first read.
    fn handshake(&self) -> Vec<Bytes>;

    /// Frame written whenever the ping interval has elapsed.
    fn keepalive(&self) -> Bytes;
}

// ── StreamConfig ─────────────────────────────────────────────────────

/// Timing and buffering for one stream session.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Deadline for the first read; the first video packet can be slow.
    /// Also bounds the TCP connect. Default: 15s.
    pub connect_timeout: Duration,

    /// Deadline for every read after the first. Default: 2s.
    pub read_timeout: Duration,

    /// Minimum time between keep-alive frames. Default: 1s.
    pub ping_interval: Duration,

    /// Deadline for each handshake or keep-alive write. Default: 1s.
    pub write_timeout: Duration,

    /// Size of the read buffer. Default: 64 bytes.
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(2),
            ping_interval: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            buffer_size: 64,
        }
    }
}

// ── Dialing ──────────────────────────────────────────────────────────

/// Opens the byte transport the stream runs over.
pub trait Dialer: Send + Sync + 'static {
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn dial(&self, host: &str, port: u16) -> impl Future<Output = Result<Self::Conn, Error>> + Send;
}

/// Production dialer: TCP followed by a rustls handshake.
#[derive(Clone)]
pub struct TlsDialer {
    connector: TlsConnector,
    connect_timeout: Duration,
}

impl TlsDialer {
    pub fn new(transport: &TransportConfig, connect_timeout: Duration) -> Result<Self, Error> {
        let config = transport.stream_tls_config()?;
        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            connect_timeout,
        })
    }
}

impl Dialer for TlsDialer {
    type Conn = TlsStream<TcpStream>;

    async fn dial(&self, host: &str, port: u16) -> Result<Self::Conn, Error> {
        let addr = format!("{host}:{port}");
        tracing::info!(%addr, "Connecting to stream server");

        let dial_err = |source: io::Error| Error::Dial {
            addr: addr.clone(),
            source,
        };

        let tcp = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| dial_err(io::ErrorKind::TimedOut.into()))?
            .map_err(dial_err)?;
        tcp.set_nodelay(true).map_err(dial_err)?;

        let server_name = ServerName::try_from(host.to_owned())
            .map_err(|e| Error::Tls(format!("invalid server name {host}: {e}")))?;

        let tls = tokio::time::timeout(
            self.connect_timeout,
            self.connector.connect(server_name, tcp),
        )
        .await
        .map_err(|_| dial_err(io::ErrorKind::TimedOut.into()))?
        .map_err(dial_err)?;

        tracing::info!(%addr, "Connected to stream server");
        Ok(tls)
    }
}

// ── Stream lifecycle ─────────────────────────────────────────────────

/// Dial `host:port` and relay the stream into `sink` until cancelled.
///
/// Returns `Ok(())` only when the token was cancelled; every other exit
/// is an error describing why the stream ended.
pub async fn stream<D, W, H>(
    dialer: &D,
    host: &str,
    port: u16,
    sink: &mut W,
    cancel: &CancellationToken,
    config: &StreamConfig,
    hooks: &H,
) -> Result<(), Error>
where
    D: Dialer,
    W: AsyncWrite + Unpin + Send,
    H: StreamHooks + ?Sized,
{
    let conn = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::info!("Stream cancelled while dialing");
            return Ok(());
        }
        conn = dialer.dial(host, port) => conn?,
    };
    run(conn, sink, cancel, config, hooks).await
}

/// Drive an already-open connection: handshake, then the read loop.
///
/// The connection is shut down on every exit path. Closing is bounded by
/// `write_timeout` so a stalled sink cannot hold the task open.
pub async fn run<C, W, H>(
    mut conn: C,
    sink: &mut W,
    cancel: &CancellationToken,
    config: &StreamConfig,
    hooks: &H,
) -> Result<(), Error>
where
    C: AsyncRead + AsyncWrite + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    H: StreamHooks + ?Sized,
{
    let result = match send_frames(&mut conn, &hooks.handshake(), config.write_timeout).await {
        Ok(()) => read_loop(&mut conn, sink, cancel, config, hooks).await,
        Err(e) => Err(e),
    };

    match tokio::time::timeout(config.write_timeout, sink.flush()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "Flushing sink on close failed"),
        Err(_) => tracing::debug!("Flushing sink on close timed out"),
    }
    match tokio::time::timeout(config.write_timeout, conn.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "Stream shutdown failed"),
        Err(_) => tracing::debug!("Stream shutdown timed out"),
    }
    tracing::info!("Disconnected from stream server");

    result
}

async fn read_loop<C, W, H>(
    conn: &mut C,
    sink: &mut W,
    cancel: &CancellationToken,
    config: &StreamConfig,
    hooks: &H,
) -> Result<(), Error>
where
    C: AsyncRead + AsyncWrite + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    H: StreamHooks + ?Sized,
{
    let mut buf = vec![0u8; config.buffer_size.max(1)];
    let mut read_timeout = config.connect_timeout;
    let mut last_ping = Instant::now();

    loop {
        if cancel.is_cancelled() {
            tracing::info!("Closing TCP stream");
            return Ok(());
        }

        let n = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Closing TCP stream");
                return Ok(());
            }
            read = tokio::time::timeout(read_timeout, conn.read(&mut buf)) => match read {
                Err(_) => return Err(Error::ReadTimeout { timeout: read_timeout }),
                Ok(Ok(0)) => return Err(Error::PeerClosed),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(classify_read_error(e)),
            },
        };

        // A consumer that stops draining must not block cancellation.
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Closing TCP stream");
                return Ok(());
            }
            written = sink.write_all(&buf[..n]) => written.map_err(Error::Sink)?,
        }

        if last_ping.elapsed() > config.ping_interval {
            tracing::trace!("Sending keep-alive");
            send_frames(conn, &[hooks.keepalive()], config.write_timeout).await?;
            last_ping = Instant::now();
        }

        // Once data flows, tighten failure detection.
        read_timeout = config.read_timeout;
    }
}

/// Write each frame with its own write call, in order.
async fn send_frames<C>(conn: &mut C, frames: &[Bytes], write_timeout: Duration) -> Result<(), Error>
where
    C: AsyncWrite + Unpin + Send,
{
    for frame in frames {
        tokio::time::timeout(write_timeout, conn.write_all(frame))
            .await
            .map_err(|_| Error::StreamIo(io::ErrorKind::TimedOut.into()))?
            .map_err(Error::StreamIo)?;
    }
    tokio::time::timeout(write_timeout, conn.flush())
        .await
        .map_err(|_| Error::StreamIo(io::ErrorKind::TimedOut.into()))?
        .map_err(Error::StreamIo)
}

fn classify_read_error(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::PeerClosed,
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => Error::PeerReset(err),
        _ => Error::StreamIo(err),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
