// ── Live-view client ──
//
// Lifecycle management for one camera's live-view session. `connect`
// starts the remote session and spawns three tasks: the keep-alive
// poller, the stream relay and a supervisor that reacts to whichever of
// the two finishes first. `disconnect` and the supervisor share one
// generation-scoped teardown so a stale supervisor never touches a newer
// session.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use liveview_api::stream;
use liveview_api::{
    ConnectionDescriptor, Credentials, Dialer, LiveViewApi, SessionAuth, TlsDialer,
    parse_connection_string,
};

use crate::config::ClientConfig;
use crate::error::CoreError;

const EVENT_CHANNEL_SIZE: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── SessionEvent ─────────────────────────────────────────────────

/// Notable things that happen to a session after `connect` returns.
#[derive(Debug)]
pub enum SessionEvent {
    /// The remote session is up and the stream is being dialed.
    Started {
        command_id: u64,
        host: String,
        port: u16,
    },
    /// A background activity failed; teardown follows.
    Failed { command_id: u64, error: CoreError },
    /// The far end marked the session complete; teardown follows.
    Completed { command_id: u64 },
    /// Teardown finished. `stop_error` is set when the remote stop call
    /// did not succeed.
    Stopped {
        command_id: u64,
        stop_error: Option<CoreError>,
    },
}

// ── Client ───────────────────────────────────────────────────────

/// Live-view session client for a single camera.
///
/// Cheaply cloneable via `Arc<ClientInner>`. At most one session is active
/// at a time.
pub struct Client<D: Dialer = TlsDialer> {
    inner: Arc<ClientInner<D>>,
}

impl<D: Dialer> Clone for Client<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<D> {
    api: LiveViewApi,
    dialer: D,
    config: ClientConfig,
    session: Mutex<SessionSlot>,
    connection_state: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<Arc<SessionEvent>>,
}

#[derive(Default)]
struct SessionSlot {
    generation: u64,
    active: Option<ActiveSession>,
}

struct ActiveSession {
    generation: u64,
    command_id: u64,
    cancel: CancellationToken,
    supervisor: Option<JoinHandle<()>>,
}

/// Which background activity ended first.
#[derive(Debug, Clone, Copy)]
enum Activity {
    Poll,
    Stream,
}

impl Client<TlsDialer> {
    /// Create a client for the credentials' regional API host. Does NOT
    /// connect; call [`connect()`](Self::connect) to start a session.
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self, CoreError> {
        let transport = config.transport();
        let api = LiveViewApi::new(credentials, &transport)?;
        let dialer = TlsDialer::new(&transport, config.stream.connect_timeout)?;
        Ok(Self::with_dialer(api, dialer, config))
    }
}

impl<D: Dialer> Client<D> {
    /// Assemble a client from an explicit API client and stream dialer.
    pub fn with_dialer(api: LiveViewApi, dialer: D, config: ClientConfig) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ClientInner {
                api,
                dialer,
                config,
                session: Mutex::new(SessionSlot::default()),
                connection_state,
                event_tx,
            }),
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Start a live-view session and relay its video into `sink`.
    ///
    /// Returns once the remote session is started and the background tasks
    /// are running. Failures after that point arrive on [`events()`](Self::events).
    pub async fn connect<W>(&self, sink: W) -> Result<(), CoreError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut slot = self.inner.session.lock().await;
        if slot.active.is_some() {
            return Err(CoreError::AlreadyConnected);
        }

        self.set_state(ConnectionState::Connecting);
        // Falls back to Disconnected on every early return, including the
        // caller dropping this future while the start call is in flight.
        let mut connecting = ConnectingGuard {
            state: &self.inner.connection_state,
            armed: true,
        };

        let descriptor = self.inner.api.start_session().await?;
        let command_id = descriptor.command_id;

        let conn = match parse_connection_string(&descriptor.server) {
            Ok(c) => c,
            Err(e) => {
                warn!(command_id, error = %e, "unusable connection string, stopping session");
                if let Err(stop_err) = self.inner.api.stop_session(command_id).await {
                    warn!(command_id, error = %stop_err, "stop after failed connect failed (non-fatal)");
                }
                return Err(CoreError::InvalidConnectionString(e));
            }
        };

        slot.generation += 1;
        let generation = slot.generation;
        let cancel = CancellationToken::new();

        connecting.armed = false;
        self.set_state(ConnectionState::Connected);
        self.publish(SessionEvent::Started {
            command_id,
            host: conn.host.clone(),
            port: conn.port,
        });

        let poll = {
            let client = self.clone();
            let cancel = cancel.clone();
            let interval = descriptor.poll_interval();
            tokio::spawn(async move {
                client
                    .inner
                    .api
                    .poll_session(&cancel, command_id, interval)
                    .await
            })
        };

        let relay = {
            let client = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(stream_task(client, conn, sink, cancel))
        };

        let supervisor = tokio::spawn(supervise(
            self.clone(),
            generation,
            command_id,
            cancel.clone(),
            poll,
            relay,
        ));

        slot.active = Some(ActiveSession {
            generation,
            command_id,
            cancel,
            supervisor: Some(supervisor),
        });

        info!(command_id, generation, "live-view connected");
        Ok(())
    }

    /// Stop the active session, if any.
    ///
    /// No-op when disconnected. A failed remote stop is logged and
    /// published as part of [`SessionEvent::Stopped`], never returned.
    pub async fn disconnect(&self) {
        if let Some(supervisor) = self.teardown(None).await {
            if let Err(e) = supervisor.await {
                warn!(error = %e, "supervisor task ended abnormally");
            }
        }
    }

    /// Whether a session is currently active.
    pub fn is_connected(&self) -> bool {
        *self.inner.connection_state.borrow() == ConnectionState::Connected
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to the session event stream.
    pub fn events(&self) -> broadcast::Receiver<Arc<SessionEvent>> {
        self.inner.event_tx.subscribe()
    }

    // ── Internals ────────────────────────────────────────────────

    /// Take the active session out, cancel it and stop it remotely.
    ///
    /// With `Some(generation)` only that session is torn down. Returns the
    /// supervisor handle so the caller can wait for the tasks to drain.
    async fn teardown(&self, generation: Option<u64>) -> Option<JoinHandle<()>> {
        let mut slot = self.inner.session.lock().await;
        let mut active = slot
            .active
            .take_if(|a| generation.is_none_or(|g| a.generation == g))?;

        active.cancel.cancel();
        self.set_state(ConnectionState::Disconnected);

        let command_id = active.command_id;
        let stop_error = match self.inner.api.stop_session(command_id).await {
            Ok(_) => None,
            Err(e) => {
                warn!(command_id, error = %e, "stop session failed (non-fatal)");
                Some(CoreError::from(e))
            }
        };
        drop(slot);

        self.publish(SessionEvent::Stopped {
            command_id,
            stop_error,
        });
        debug!(command_id, generation = active.generation, "session torn down");

        active.supervisor.take()
    }

    fn set_state(&self, state: ConnectionState) {
        self.inner.connection_state.send_replace(state);
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.event_tx.send(Arc::new(event));
    }
}

/// Publishes `Disconnected` when dropped while still armed.
struct ConnectingGuard<'a> {
    state: &'a watch::Sender<ConnectionState>,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

async fn stream_task<D, W>(
    client: Client<D>,
    conn: ConnectionDescriptor,
    mut sink: W,
    cancel: CancellationToken,
) -> Result<(), liveview_api::Error>
where
    D: Dialer,
    W: AsyncWrite + Unpin + Send,
{
    let hooks = SessionAuth::from(&conn);
    stream::stream(
        &client.inner.dialer,
        &conn.host,
        conn.port,
        &mut sink,
        &cancel,
        &client.inner.config.stream,
        &hooks,
    )
    .await
}

/// Wait for the first activity to end, report it, then tear down.
async fn supervise<D: Dialer>(
    client: Client<D>,
    generation: u64,
    command_id: u64,
    cancel: CancellationToken,
    mut poll: JoinHandle<Result<(), liveview_api::Error>>,
    mut relay: JoinHandle<Result<(), liveview_api::Error>>,
) {
    let (activity, outcome) = tokio::select! {
        r = &mut poll => (Activity::Poll, r),
        r = &mut relay => (Activity::Stream, r),
    };
    let other = match activity {
        Activity::Poll => relay,
        Activity::Stream => poll,
    };

    let cancelled_by_caller = cancel.is_cancelled();
    cancel.cancel();

    match outcome {
        Ok(Ok(())) => debug!(command_id, ?activity, "activity stopped"),
        Ok(Err(e)) if cancelled_by_caller => {
            debug!(command_id, ?activity, error = %e, "activity ended during shutdown");
        }
        Ok(Err(e)) if e.is_session_complete() => {
            info!(command_id, "session marked complete by the far end");
            client.publish(SessionEvent::Completed { command_id });
        }
        Ok(Err(e)) => {
            warn!(command_id, ?activity, error = %e, "live-view activity failed");
            client.publish(SessionEvent::Failed {
                command_id,
                error: CoreError::from(e),
            });
        }
        Err(e) => {
            warn!(command_id, ?activity, error = %e, "live-view task panicked");
            client.publish(SessionEvent::Failed {
                command_id,
                error: CoreError::Internal(format!("{activity:?} task: {e}")),
            });
        }
    }

    if let Err(e) = other.await {
        warn!(command_id, error = %e, "background task ended abnormally");
    }

    if !cancelled_by_caller {
        // Our own handle comes back here; dropping it detaches.
        let _ = client.teardown(Some(generation)).await;
    }
}
