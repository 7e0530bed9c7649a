//! WebSocket transport sessions.
//!
//! A [`Session`] is one transport instance: a duplex pair of channels that
//! carries outbound text frames down and [`TransportEvent`]s up. The
//! [`Connector`] trait is the seam the connection manager opens sessions
//! through; [`WsConnector`] backs it with tokio-tungstenite.
//!
//! Every session reports its lifecycle through the same four signals a
//! browser socket would: `Open`, `Message`, `Error`, and a single final
//! `Close`. A failed handshake is reported as `Error` followed by `Close`,
//! so callers only need one recovery path.
//!
//! # Example
//!
//! ```rust,ignore
//! use opsfeed_api::{Connector, TransportEvent, WsConnector};
//! use url::Url;
//!
//! let connector = WsConnector::default();
//! let mut session = connector.open(&Url::parse("ws://localhost:8080/ws")?);
//!
//! while let Some(event) = session.next_event().await {
//!     if let TransportEvent::Message(text) = event {
//!         println!("{text}");
//!     }
//! }
//! ```

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

/// Close code reported when the stream ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code for a close we initiated ourselves.
const NORMAL_CLOSURE: u16 = 1000;

// ── TransportEvent ───────────────────────────────────────────────────

/// Lifecycle signal emitted by a transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed; the socket is ready for frames.
    Open,
    /// One inbound text frame, undecoded.
    Message(String),
    /// The session is gone. Always the last event of a session.
    Close { code: u16, reason: String },
    /// Transport-level failure. Advisory only -- a `Close` always follows.
    Error(String),
}

// ── Session ──────────────────────────────────────────────────────────

/// Consumer side of one transport instance.
///
/// Dropping the session releases the socket: the driver sees the outbound
/// channel close, sends a close frame, and exits.
#[derive(Debug)]
pub struct Session {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Driver side of a session: whoever owns the actual socket.
#[derive(Debug)]
pub struct SessionPeer {
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Session {
    /// Create a connected session / peer pair.
    pub fn pair() -> (Session, SessionPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        (
            Session {
                outbound: outbound_tx,
                events: events_rx,
            },
            SessionPeer {
                outbound: outbound_rx,
                events: events_tx,
            },
        )
    }

    /// Queue a text frame for the socket. Returns `false` if the driver
    /// has already gone away.
    pub fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    /// Wait for the next lifecycle event. `None` once the driver is gone
    /// and every event has been drained.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Split into the raw outbound sender and event receiver.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        (self.outbound, self.events)
    }
}

impl SessionPeer {
    /// Report an event to the session. Returns `false` if the session
    /// has been dropped.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Wait for the next outbound frame. `None` once the session is dropped.
    pub async fn next_outbound(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Take an already-queued outbound frame without waiting.
    pub fn try_next_outbound(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Returns `true` once the session side has been dropped.
    pub fn is_released(&self) -> bool {
        self.events.is_closed()
    }
}

// ── Connector ────────────────────────────────────────────────────────

/// Opens transport sessions to an endpoint.
///
/// Opening never fails synchronously; failures surface on the returned
/// session as `Error` followed by `Close`.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, endpoint: &Url) -> Session;
}

/// tokio-tungstenite backed [`Connector`].
///
/// Each session runs on its own spawned task. Cancelling the connector's
/// token closes every session it opened. Must be used from within a
/// Tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    cancel: CancellationToken,
}

impl WsConnector {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl Connector for WsConnector {
    fn open(&self, endpoint: &Url) -> Session {
        let (session, peer) = Session::pair();
        let url = endpoint.clone();
        let cancel = self.cancel.child_token();

        tokio::spawn(async move {
            run_session(url, peer, cancel).await;
        });

        session
    }
}

// ── Session driver ───────────────────────────────────────────────────

/// Drive one socket to completion, always finishing with a `Close` event.
async fn run_session(url: Url, mut peer: SessionPeer, cancel: CancellationToken) {
    let (code, reason) = match drive_socket(&url, &mut peer, &cancel).await {
        Ok(close) => close,
        Err(e) => {
            tracing::warn!(error = %e, url = %url, "WebSocket error");
            peer.emit(TransportEvent::Error(e.to_string()));
            match e {
                Error::WebSocketClosed { code, reason } => (code, reason),
                other => (ABNORMAL_CLOSURE, other.to_string()),
            }
        }
    };

    peer.emit(TransportEvent::Close { code, reason });
    tracing::debug!(url = %url, "WebSocket session exiting");
}

/// Connect, then pump frames both ways until either side closes.
///
/// Returns the close code and reason on an orderly end.
async fn drive_socket(
    url: &Url,
    peer: &mut SessionPeer,
    cancel: &CancellationToken,
) -> Result<(u16, String), Error> {
    tracing::info!(url = %url, "Connecting to WebSocket");

    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok((NORMAL_CLOSURE, "cancelled".into())),
        result = tokio_tungstenite::connect_async(url.as_str()) => {
            result.map_err(|e| Error::WebSocketConnect(e.to_string()))?
        }
    };

    tracing::info!("WebSocket connected");
    if !peer.emit(TransportEvent::Open) {
        // Session released while we were handshaking.
        return Ok((NORMAL_CLOSURE, "session released".into()));
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok((NORMAL_CLOSURE, "client shutdown".into()));
            }
            outbound = peer.outbound.recv() => {
                let Some(text) = outbound else {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok((NORMAL_CLOSURE, "session released".into()));
                };
                write
                    .send(Message::Text(text.into()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        peer.emit(TransportEvent::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Ok(close_details(frame.as_ref()));
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("WebSocket stream ended");
                        return Ok((ABNORMAL_CLOSURE, "stream ended".into()));
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

fn close_details(frame: Option<&tungstenite::protocol::CloseFrame>) -> (u16, String) {
    match frame {
        Some(cf) => {
            tracing::info!(
                code = %cf.code,
                reason = %cf.reason,
                "WebSocket close frame received"
            );
            (u16::from(cf.code), cf.reason.as_str().to_owned())
        }
        None => {
            tracing::info!("WebSocket close frame received (no payload)");
            (NORMAL_CLOSURE, String::new())
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn session_pair_carries_frames_both_ways() {
        let (mut session, mut peer) = Session::pair();

        assert!(session.send("hello".into()));
        assert_eq!(peer.next_outbound().await.as_deref(), Some("hello"));

        assert!(peer.emit(TransportEvent::Open));
        assert_eq!(session.next_event().await, Some(TransportEvent::Open));
    }

    #[test]
    fn dropping_session_releases_peer() {
        let (session, mut peer) = Session::pair();
        assert!(!peer.is_released());

        drop(session);
        assert!(peer.is_released());
        assert!(!peer.emit(TransportEvent::Open));
        assert!(peer.try_next_outbound().is_none());
    }

    #[test]
    fn next_event_waits_for_the_driver() {
        let (mut session, peer) = Session::pair();
        let mut next = tokio_test::task::spawn(session.next_event());
        tokio_test::assert_pending!(next.poll());

        peer.emit(TransportEvent::Error("boom".into()));
        assert!(next.is_woken());
        tokio_test::assert_ready_eq!(next.poll(), Some(TransportEvent::Error("boom".into())));
    }

    #[tokio::test]
    async fn refused_connection_reports_error_then_close() {
        // Bind then drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
        let mut session = WsConnector::default().open(&url);

        let first = session.next_event().await.unwrap();
        assert!(matches!(first, TransportEvent::Error(_)), "got {first:?}");

        let second = session.next_event().await.unwrap();
        assert!(
            matches!(second, TransportEvent::Close { code: ABNORMAL_CLOSURE, .. }),
            "got {second:?}"
        );
    }

    #[tokio::test]
    async fn live_socket_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            // Echo the first text frame back, then close.
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    ws.send(Message::Text(text)).await.unwrap();
                    ws.close(None).await.unwrap();
                    break;
                }
            }
        });

        let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
        let mut session = WsConnector::default().open(&url);

        assert_eq!(session.next_event().await, Some(TransportEvent::Open));
        assert!(session.send(r#"{"type":"ping"}"#.into()));
        assert_eq!(
            session.next_event().await,
            Some(TransportEvent::Message(r#"{"type":"ping"}"#.into()))
        );

        let close = session.next_event().await.unwrap();
        assert!(matches!(close, TransportEvent::Close { .. }), "got {close:?}");

        server.await.unwrap();
    }
}
