//! Realtime data and alert core for live dashboards.
//!
//! This crate sits between the `opsfeed-api` transport and UI consumers:
//!
//! - **[`ConnectionManager`]**: One persistent duplex connection per
//!   endpoint. Multiplexes topic subscriptions over it, re-issues them
//!   after every reconnect, and publishes each decoded inbound payload to
//!   all observers. Reconnects on its own after a close (fixed 5 s by
//!   default).
//!
//! - **[`TopicRegistry`]** / **[`LiveFeed`]**: The desired topic set,
//!   reference-counted per consumer. A `LiveFeed` is the consumer handle:
//!   it exposes connection status and the latest payload, and drops its
//!   interest when dropped.
//!
//! - **[`AlertQueue`]**: Bounded, newest-first alert collection with
//!   per-severity defaults, auto-dismiss timers, acknowledgement, and
//!   active / critical views.
//!
//! - **[`Hub`]**: Root composition owning one of each and tearing them
//!   down together.
//!
//! All state is observed through `tokio::sync::watch` snapshots, so
//! readers never block writers.

pub mod alerts;
pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod stream;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use alerts::{Alert, AlertId, AlertOptions, AlertQueue, Severity};
pub use config::{AlertConfig, ConnectionConfig, DEFAULT_ENDPOINT, HubConfig, ReconnectConfig};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::CoreError;
pub use hub::Hub;
pub use stream::{AlertStream, Snapshot, SnapshotStream};
pub use subscription::{Interest, LiveFeed, TopicRegistry};

pub use opsfeed_api::{Connector, Session, SessionPeer, TransportEvent, WsConnector};
