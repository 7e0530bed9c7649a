// opsfeed-api: WebSocket transport and wire codec for the opsfeed realtime core.

pub mod error;
pub mod protocol;
pub mod websocket;

pub use error::Error;
pub use protocol::ControlFrame;
pub use websocket::{Connector, Session, SessionPeer, TransportEvent, WsConnector};
