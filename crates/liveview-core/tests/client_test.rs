#![allow(clippy::unwrap_used)]
// Integration tests for the live-view `Client` state machine.
//
// The session API is served by wiremock; the video stream runs over an
// in-memory duplex pipe handed out by a test dialer.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::broadcast;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use liveview_api::{ConnectionStringError, Dialer, LiveViewApi, TransportConfig};
use liveview_core::{Client, ClientConfig, ConnectionState, CoreError, Credentials, SessionEvent};

// ── Helpers ─────────────────────────────────────────────────────────

const START_PATH: &str = "/api/v5/accounts/1001/networks/2002/cameras/3003/liveview";
const POLL_PATH: &str = "/network/2002/command/777";
const STOP_PATH: &str = "/network/2002/command/777/done";
const SERVER: &str = "immis://127.0.0.1:443/ABC_1706541234?client_id=55";
const HANDSHAKE_LEN: usize = 24 + 4 + 74 + 3 + 13;

/// Hands out one pre-built in-memory connection, then refuses.
struct PipeDialer {
    conn: Mutex<Option<DuplexStream>>,
}

impl PipeDialer {
    fn new(conn: Option<DuplexStream>) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl Dialer for PipeDialer {
    type Conn = DuplexStream;

    async fn dial(&self, host: &str, port: u16) -> Result<DuplexStream, liveview_api::Error> {
        let conn = self.conn.lock().unwrap().take();
        conn.ok_or_else(|| liveview_api::Error::Dial {
            addr: format!("{host}:{port}"),
            source: io::ErrorKind::ConnectionRefused.into(),
        })
    }
}

struct Harness {
    server: MockServer,
    client: Client<PipeDialer>,
    /// Far end of the video connection, if the dialer was given one.
    peer: Option<DuplexStream>,
    /// Read end of the sink handed to `connect`.
    sink_rx: DuplexStream,
    sink_tx: Option<DuplexStream>,
}

async fn harness(with_peer: bool) -> Harness {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let credentials = Credentials::new("u011", "tok-abc123", "camera", 1001, 2002, 3003);
    let api = LiveViewApi::with_base_url(base_url, credentials, &TransportConfig::default()).unwrap();

    let (peer, conn) = if with_peer {
        let (local, remote) = tokio::io::duplex(4096);
        (Some(remote), Some(local))
    } else {
        (None, None)
    };

    let client = Client::with_dialer(api, PipeDialer::new(conn), ClientConfig::default());
    let (sink_tx, sink_rx) = tokio::io::duplex(4096);

    Harness {
        server,
        client,
        peer,
        sink_rx,
        sink_tx: Some(sink_tx),
    }
}

async fn mount_start(server: &MockServer, body: serde_json::Value, expect: u64) {
    Mock::given(method("POST"))
        .and(path(START_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expect)
        .mount(server)
        .await;
}

fn started(polling_interval: u64, server: &str) -> serde_json::Value {
    json!({
        "command_id": 777,
        "polling_interval": polling_interval,
        "server": server
    })
}

async fn mount_poll(server: &MockServer, complete: bool) {
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "complete": complete })))
        .mount(server)
        .await;
}

async fn mount_stop(server: &MockServer, expect: u64) {
    Mock::given(method("POST"))
        .and(path(STOP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 902 })))
        .expect(expect)
        .mount(server)
        .await;
}

async fn next_event(rx: &mut broadcast::Receiver<Arc<SessionEvent>>) -> Arc<SessionEvent> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .unwrap()
}

async fn wait_disconnected(client: &Client<PipeDialer>) {
    let mut state = client.connection_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await
    .expect("timed out waiting for Disconnected")
    .unwrap();
}

// ── Lifecycle tests ─────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_relays_video_and_disconnects() {
    let mut h = harness(true).await;
    mount_start(&h.server, started(15, SERVER), 1).await;
    mount_poll(&h.server, false).await;
    mount_stop(&h.server, 1).await;

    let mut events = h.client.events();
    h.client.connect(h.sink_tx.take().unwrap()).await.unwrap();
    assert!(h.client.is_connected());

    match &*next_event(&mut events).await {
        SessionEvent::Started {
            command_id,
            host,
            port,
        } => {
            assert_eq!(*command_id, 777);
            assert_eq!(host, "127.0.0.1");
            assert_eq!(*port, 443);
        }
        other => panic!("expected Started, got {other:?}"),
    }

    // Handshake arrives before anything is read.
    let peer = h.peer.as_mut().unwrap();
    let mut handshake = [0u8; HANDSHAKE_LEN];
    peer.read_exact(&mut handshake).await.unwrap();
    assert_eq!(handshake[3], 0x28);
    assert_eq!(&handshake[24..28], &55u32.to_be_bytes());
    assert_eq!(&handshake[102..105], b"ABC");

    peer.write_all(b"\x47video-bytes").await.unwrap();
    let mut relayed = [0u8; 12];
    h.sink_rx.read_exact(&mut relayed).await.unwrap();
    assert_eq!(&relayed, b"\x47video-bytes");

    h.client.disconnect().await;
    assert!(!h.client.is_connected());

    match &*next_event(&mut events).await {
        SessionEvent::Stopped {
            command_id,
            stop_error,
        } => {
            assert_eq!(*command_id, 777);
            assert!(stop_error.is_none(), "stop failed: {stop_error:?}");
        }
        other => panic!("expected Stopped, got {other:?}"),
    }
}

#[tokio::test]
async fn test_double_connect_is_rejected() {
    let mut h = harness(true).await;
    mount_start(&h.server, started(15, SERVER), 1).await;
    mount_poll(&h.server, false).await;
    mount_stop(&h.server, 1).await;

    h.client.connect(h.sink_tx.take().unwrap()).await.unwrap();

    let (second_sink, _second_rx) = tokio::io::duplex(64);
    let result = h.client.connect(second_sink).await;
    assert!(
        matches!(result, Err(CoreError::AlreadyConnected)),
        "expected AlreadyConnected, got: {result:?}"
    );
    assert!(h.client.is_connected());

    h.client.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_when_idle_is_a_no_op() {
    let h = harness(false).await;

    h.client.disconnect().await;
    h.client.disconnect().await;

    assert!(!h.client.is_connected());
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disconnect_twice_stops_once() {
    let mut h = harness(true).await;
    mount_start(&h.server, started(15, SERVER), 1).await;
    mount_poll(&h.server, false).await;
    mount_stop(&h.server, 1).await;

    h.client.connect(h.sink_tx.take().unwrap()).await.unwrap();

    let other = h.client.clone();
    tokio::join!(h.client.disconnect(), other.disconnect());
    assert!(!h.client.is_connected());
}

#[tokio::test]
async fn test_disconnect_completes_with_stalled_sink() {
    let mut h = harness(true).await;
    mount_start(&h.server, started(15, SERVER), 1).await;
    mount_poll(&h.server, false).await;
    mount_stop(&h.server, 1).await;

    // Nothing ever reads this sink, so relaying blocks after 16 bytes.
    let (sink, _undrained) = tokio::io::duplex(16);
    h.client.connect(sink).await.unwrap();

    let peer = h.peer.as_mut().unwrap();
    let mut handshake = [0u8; HANDSHAKE_LEN];
    peer.read_exact(&mut handshake).await.unwrap();
    peer.write_all(&[0x47; 256]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::time::timeout(Duration::from_secs(5), h.client.disconnect())
        .await
        .expect("disconnect hung on a stalled sink");
    assert!(!h.client.is_connected());
}

// ── Connect failures ────────────────────────────────────────────────

#[tokio::test]
async fn test_start_failure_leaves_client_disconnected() {
    let mut h = harness(true).await;
    Mock::given(method("POST"))
        .and(path(START_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let result = h.client.connect(h.sink_tx.take().unwrap()).await;
    assert!(
        matches!(result, Err(CoreError::SessionStart { .. })),
        "expected SessionStart, got: {result:?}"
    );
    assert_eq!(*h.client.connection_state().borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_bad_connection_string_stops_started_session() {
    let mut h = harness(true).await;
    mount_start(&h.server, started(15, "immis://127.0.0.1:8443/ABC_1?client_id=55"), 1).await;
    mount_stop(&h.server, 1).await;

    let result = h.client.connect(h.sink_tx.take().unwrap()).await;
    assert!(
        matches!(
            result,
            Err(CoreError::InvalidConnectionString(ConnectionStringError::BadPort {
                port: Some(8443)
            }))
        ),
        "expected BadPort, got: {result:?}"
    );
    assert_eq!(*h.client.connection_state().borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_abandoned_connect_resets_state() {
    let mut h = harness(true).await;
    Mock::given(method("POST"))
        .and(path(START_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(started(15, SERVER))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&h.server)
        .await;

    let state = h.client.connection_state();
    let sink = h.sink_tx.take().unwrap();
    let result = tokio::time::timeout(Duration::from_millis(200), h.client.connect(sink)).await;
    assert!(result.is_err(), "connect should still be waiting on the start call");

    assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    assert!(!h.client.is_connected());
}

// ── Background termination ──────────────────────────────────────────

#[tokio::test]
async fn test_peer_close_drives_client_to_disconnected() {
    let mut h = harness(true).await;
    mount_start(&h.server, started(15, SERVER), 1).await;
    mount_poll(&h.server, false).await;
    mount_stop(&h.server, 1).await;

    let mut events = h.client.events();
    h.client.connect(h.sink_tx.take().unwrap()).await.unwrap();
    assert!(matches!(*next_event(&mut events).await, SessionEvent::Started { .. }));

    let mut peer = h.peer.take().unwrap();
    let mut handshake = [0u8; HANDSHAKE_LEN];
    peer.read_exact(&mut handshake).await.unwrap();
    drop(peer);

    wait_disconnected(&h.client).await;

    match &*next_event(&mut events).await {
        SessionEvent::Failed { command_id, error } => {
            assert_eq!(*command_id, 777);
            assert!(
                matches!(error, CoreError::Stream(liveview_api::Error::PeerClosed)),
                "got {error:?}"
            );
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(matches!(
        *next_event(&mut events).await,
        SessionEvent::Stopped { stop_error: None, .. }
    ));
}

#[tokio::test]
async fn test_dial_failure_is_reported() {
    let mut h = harness(false).await;
    mount_start(&h.server, started(15, SERVER), 1).await;
    mount_poll(&h.server, false).await;
    mount_stop(&h.server, 1).await;

    let mut events = h.client.events();
    h.client.connect(h.sink_tx.take().unwrap()).await.unwrap();
    assert!(matches!(*next_event(&mut events).await, SessionEvent::Started { .. }));

    match &*next_event(&mut events).await {
        SessionEvent::Failed { error, .. } => assert!(
            matches!(error, CoreError::Stream(liveview_api::Error::Dial { .. })),
            "got {error:?}"
        ),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(matches!(
        *next_event(&mut events).await,
        SessionEvent::Stopped { .. }
    ));
    wait_disconnected(&h.client).await;
}

#[tokio::test]
async fn test_session_complete_is_not_a_failure() {
    let mut h = harness(true).await;
    mount_start(&h.server, started(1, SERVER), 1).await;
    mount_poll(&h.server, true).await;
    mount_stop(&h.server, 1).await;

    let mut events = h.client.events();
    h.client.connect(h.sink_tx.take().unwrap()).await.unwrap();
    assert!(matches!(*next_event(&mut events).await, SessionEvent::Started { .. }));

    assert!(matches!(
        *next_event(&mut events).await,
        SessionEvent::Completed { command_id: 777 }
    ));
    assert!(matches!(
        *next_event(&mut events).await,
        SessionEvent::Stopped { .. }
    ));
    wait_disconnected(&h.client).await;
    drop(h.peer);
}

#[tokio::test]
async fn test_failed_stop_is_published_not_returned() {
    let mut h = harness(true).await;
    mount_start(&h.server, started(15, SERVER), 1).await;
    mount_poll(&h.server, false).await;
    Mock::given(method("POST"))
        .and(path(STOP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 900,
            "message": "busy"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut events = h.client.events();
    h.client.connect(h.sink_tx.take().unwrap()).await.unwrap();
    h.client.disconnect().await;
    assert!(!h.client.is_connected());

    assert!(matches!(*next_event(&mut events).await, SessionEvent::Started { .. }));
    match &*next_event(&mut events).await {
        SessionEvent::Stopped { stop_error, .. } => assert!(
            matches!(stop_error, Some(CoreError::SessionStop { code: Some(900), .. })),
            "got {stop_error:?}"
        ),
        other => panic!("expected Stopped, got {other:?}"),
    }
}
