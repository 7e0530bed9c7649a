// ── Connection manager ──
//
// Owns the single duplex connection to the backend, multiplexes topic
// subscriptions over it, and reconnects on its own after every close.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use opsfeed_api::protocol::{self, ControlFrame};
use opsfeed_api::{Connector, TransportEvent};

use crate::config::ConnectionConfig;
use crate::error::CoreError;
use crate::subscription::{LiveFeed, TopicRegistry};

const MESSAGE_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection lifecycle phase, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    /// No socket. A reconnect may be pending.
    Disconnected,
    /// Socket opened, handshake in progress.
    Connecting,
    /// Socket ready; frames flow both ways.
    Connected,
    /// The transport reported an error. The socket is still held until
    /// its close signal arrives, which is what drives reconnection.
    Errored,
}

impl ConnectionState {
    /// Whether a socket is held in this state.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

// ── ConnectionManager ────────────────────────────────────────────

/// Maintains at most one live connection to a fixed endpoint.
///
/// Cheaply cloneable via `Arc<ManagerInner>`. Constructed explicitly by the
/// application root (see [`Hub`](crate::Hub)) and passed down; there is no
/// global instance. All methods are non-blocking: connection attempts and
/// sends are fire-and-forget, and results surface through
/// [`state_changes`](Self::state_changes) and [`messages`](Self::messages).
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    last_message: watch::Sender<Option<Arc<Value>>>,
    messages: broadcast::Sender<Arc<Value>>,
    link: Mutex<Link>,
    cancel: CancellationToken,
}

/// Mutable connection state, guarded as a unit so the socket, the
/// lifecycle phase and the topic set never disagree.
struct Link {
    registry: TopicRegistry,
    /// Outbound half of the live session. `Some` iff the state is live.
    socket: Option<mpsc::UnboundedSender<String>>,
    /// Bumped for every new session; events from older sessions are stale.
    generation: u64,
    /// Consecutive reconnect attempts since the last successful open.
    attempt: u32,
    reconnect: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ConnectionManager {
    /// Create a manager. Does NOT connect -- call [`connect()`](Self::connect)
    /// or [`watch()`](Self::watch).
    pub fn new(config: ConnectionConfig, connector: impl Connector) -> Self {
        Self::with_shared_connector(config, Arc::new(connector))
    }

    pub fn with_shared_connector(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (last_message, _) = watch::channel(None);
        let (messages, _) = broadcast::channel(MESSAGE_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ManagerInner {
                config,
                connector,
                state,
                last_message,
                messages,
                link: Mutex::new(Link {
                    registry: TopicRegistry::new(),
                    socket: None,
                    generation: 0,
                    attempt: 0,
                    reconnect: None,
                    shut_down: false,
                }),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Access the connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the connection if no socket is live.
    ///
    /// A no-op while connecting, connected, or waiting for an errored
    /// socket to close. Cancels a pending reconnect timer. Must be called
    /// from within a Tokio runtime.
    pub fn connect(&self) -> Result<(), CoreError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| CoreError::NoRuntime { operation: "connect" })?;

        let mut link = self.lock();
        if link.shut_down {
            return Err(CoreError::ShutDown {
                component: "connection manager",
            });
        }
        if link.socket.is_some() {
            return Ok(());
        }
        if let Some(pending) = link.reconnect.take() {
            pending.abort();
        }

        link.generation += 1;
        let generation = link.generation;

        info!(endpoint = %self.inner.config.endpoint, generation, "connecting");
        let session = self.inner.connector.open(&self.inner.config.endpoint);
        let (outbound, events) = session.into_parts();
        link.socket = Some(outbound);
        self.set_state(ConnectionState::Connecting);
        drop(link);

        let weak = Arc::downgrade(&self.inner);
        let cancel = self.inner.cancel.clone();
        runtime.spawn(drive_session(weak, generation, events, cancel));
        Ok(())
    }

    /// Tear down: close the live socket, cancel any pending reconnect,
    /// and refuse further use. Idempotent.
    pub fn shutdown(&self) {
        let mut link = self.lock();
        if link.shut_down {
            return;
        }
        link.shut_down = true;
        link.generation += 1;
        link.socket = None;
        if let Some(pending) = link.reconnect.take() {
            pending.abort();
        }
        self.set_state(ConnectionState::Disconnected);
        drop(link);

        self.inner.cancel.cancel();
        info!("connection manager shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Subscribe to a topic. Idempotent.
    ///
    /// Sends a subscribe frame right away when connected; otherwise the
    /// topic is sent on the next successful open.
    pub fn subscribe(&self, topic: &str) {
        let mut link = self.lock();
        if link.registry.pin(topic) {
            debug!(topic, "topic subscribed");
            self.send_control(&link, &ControlFrame::subscribe(topic));
        }
    }

    /// Unsubscribe from a topic, dropping every interest in it. Idempotent.
    pub fn unsubscribe(&self, topic: &str) {
        let mut link = self.lock();
        if link.registry.remove(topic) {
            debug!(topic, "topic unsubscribed");
            self.send_control(&link, &ControlFrame::unsubscribe(topic));
        }
    }

    /// Topics currently wanted, in first-subscribed order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.lock().registry.topics()
    }

    /// Consumer accessor: connect on demand, hold interest in `topic` for
    /// the lifetime of the returned [`LiveFeed`], and expose status and the
    /// latest payload.
    pub fn watch(&self, topic: Option<&str>) -> Result<LiveFeed, CoreError> {
        self.connect()?;
        if let Some(topic) = topic {
            self.attach(topic);
        }
        Ok(LiveFeed::new(self.clone(), topic.map(str::to_owned)))
    }

    pub(crate) fn attach(&self, topic: &str) {
        let mut link = self.lock();
        if link.registry.attach(topic) {
            debug!(topic, "first consumer attached");
            self.send_control(&link, &ControlFrame::subscribe(topic));
        }
    }

    pub(crate) fn detach(&self, topic: &str) {
        let mut link = self.lock();
        if link.registry.detach(topic) {
            debug!(topic, "last consumer detached");
            self.send_control(&link, &ControlFrame::unsubscribe(topic));
        }
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Send a JSON message as-is.
    ///
    /// Dropped with a warning unless connected; nothing is queued. Returns
    /// whether the frame was handed to the transport, which is not a
    /// delivery guarantee.
    pub fn send(&self, message: &Value) -> bool {
        match protocol::encode_message(message) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!(error = %e, "dropping outbound message: encode failed");
                false
            }
        }
    }

    /// Send a pre-encoded text frame. Same delivery rules as [`send`](Self::send).
    pub fn send_text(&self, text: String) -> bool {
        let link = self.lock();
        let state = self.state();
        match (&link.socket, state) {
            (Some(socket), ConnectionState::Connected) => socket.send(text).is_ok(),
            _ => {
                warn!(%state, "dropping outbound message: not connected");
                false
            }
        }
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Most recently decoded inbound payload.
    pub fn last_message(&self) -> Option<Arc<Value>> {
        self.inner.last_message.borrow().clone()
    }

    pub(crate) fn latest_changes(&self) -> watch::Receiver<Option<Arc<Value>>> {
        self.inner.last_message.subscribe()
    }

    /// Every decoded inbound payload, in arrival order.
    ///
    /// A receiver that falls behind gets
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn messages(&self) -> broadcast::Receiver<Arc<Value>> {
        self.inner.messages.subscribe()
    }

    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    // ── Transport events ─────────────────────────────────────────

    /// Apply one transport event from session `generation`.
    fn handle_event(&self, generation: u64, event: TransportEvent) {
        let mut link = self.lock();
        if link.shut_down || link.generation != generation {
            debug!(generation, current = link.generation, "ignoring event from stale session");
            return;
        }

        match event {
            TransportEvent::Open => {
                link.attempt = 0;
                let topics = link.registry.topics();
                for topic in &topics {
                    send_frame(&link, &ControlFrame::subscribe(topic.as_str()));
                }
                self.set_state(ConnectionState::Connected);
                info!(resubscribed = topics.len(), "connected");
            }
            TransportEvent::Message(text) => {
                drop(link);
                self.publish(&text);
            }
            TransportEvent::Error(reason) => {
                warn!(%reason, "transport error");
                self.set_state(ConnectionState::Errored);
            }
            TransportEvent::Close { code, reason } => {
                link.socket = None;
                self.set_state(ConnectionState::Disconnected);
                info!(code, %reason, "disconnected");
                self.schedule_reconnect(&mut link);
            }
        }
    }

    /// Decode an inbound frame and notify observers. Malformed frames are
    /// discarded and the previous payload is kept.
    fn publish(&self, text: &str) {
        let payload = match protocol::decode_inbound(text) {
            Ok(value) => Arc::new(value),
            Err(e) => {
                warn!(error = %e, len = text.len(), "discarding malformed frame");
                return;
            }
        };

        self.inner.last_message.send_replace(Some(Arc::clone(&payload)));
        // Ignore send errors -- just means no active subscribers right now
        let _ = self.inner.messages.send(payload);
    }

    fn schedule_reconnect(&self, link: &mut Link) {
        let reconnect = &self.inner.config.reconnect;
        if let Some(max) = reconnect.max_retries {
            if link.attempt >= max {
                error!(max_retries = max, "reconnection limit reached, giving up");
                return;
            }
        }

        let delay = reconnect.delay_for(link.attempt);
        let attempt = link.attempt;
        link.attempt = link.attempt.saturating_add(1);
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        let deadline = tokio::time::Instant::now() + delay;
        let weak = Arc::downgrade(&self.inner);
        let cancel = self.inner.cancel.clone();
        link.reconnect = Some(tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep_until(deadline) => {}
            }

            let Some(inner) = weak.upgrade() else { return };
            let manager = ConnectionManager { inner };
            manager.lock().reconnect = None;
            if let Err(e) = manager.connect() {
                debug!(error = %e, "reconnect skipped");
            }
        }));
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Link> {
        self.inner.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ConnectionState) {
        self.inner.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = %state, to = %next, "connection state change");
            *state = next;
            true
        });
    }

    /// Send a control frame, but only over a connected socket. While
    /// connecting, the registry alone carries the topic to the next open.
    fn send_control(&self, link: &Link, frame: &ControlFrame) {
        if self.state().is_connected() {
            send_frame(link, frame);
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.config.endpoint.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn send_frame(link: &Link, frame: &ControlFrame) {
    let Some(socket) = &link.socket else {
        return;
    };
    match frame.encode() {
        Ok(text) => {
            let _ = socket.send(text);
        }
        Err(e) => warn!(error = %e, topic = frame.topic(), "failed to encode control frame"),
    }
}

// ── Background session driver ────────────────────────────────────

/// Feed one session's events into the manager until it closes.
///
/// Holds only a weak reference so dropping every manager handle tears the
/// connection down.
async fn drive_session(
    manager: Weak<ManagerInner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        let Some(inner) = manager.upgrade() else { break };
        let manager_handle = ConnectionManager { inner };

        // A driver that vanishes without a close signal counts as one.
        let event = event.unwrap_or_else(|| TransportEvent::Close {
            code: 1006,
            reason: "transport dropped".into(),
        });
        let closed = matches!(event, TransportEvent::Close { .. });
        manager_handle.handle_event(generation, event);
        if closed {
            break;
        }
    }

    debug!(generation, "session driver exiting");
}

// ── Tests ────────────────────────────────────────────────────────────
