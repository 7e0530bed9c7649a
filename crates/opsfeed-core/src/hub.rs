// ── Hub ──
//
// Root composition: builds the connection manager and alert queue once,
// owns their lifetime, and tears both down together. Consumers receive
// the hub (or clones of its parts) explicitly; nothing is global.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::info;

use opsfeed_api::{Connector, WsConnector};

use crate::alerts::AlertQueue;
use crate::config::HubConfig;
use crate::connection::ConnectionManager;
use crate::error::CoreError;

/// Owner of the realtime core.
///
/// Dropping the hub shuts everything down: the live socket is closed, any
/// pending reconnect is cancelled, and every auto-dismiss timer is aborted.
pub struct Hub {
    connection: ConnectionManager,
    alerts: AlertQueue,
    cancel: CancellationToken,
    shut_down: AtomicBool,
}

impl Hub {
    /// Build a hub that talks to the configured endpoint over WebSocket.
    pub fn new(config: HubConfig) -> Self {
        let cancel = CancellationToken::new();
        let connector = WsConnector::new(cancel.child_token());
        Self::build(config, Arc::new(connector), cancel)
    }

    /// Build a hub over a caller-supplied transport.
    pub fn with_connector(config: HubConfig, connector: impl Connector) -> Self {
        Self::build(config, Arc::new(connector), CancellationToken::new())
    }

    fn build(config: HubConfig, connector: Arc<dyn Connector>, cancel: CancellationToken) -> Self {
        let HubConfig { connection, alerts } = config;
        Self {
            connection: ConnectionManager::with_shared_connector(connection, connector),
            alerts: AlertQueue::new(alerts),
            cancel,
            shut_down: AtomicBool::new(false),
        }
    }

    /// The connection manager. Fails once the hub has been shut down.
    pub fn connection(&self) -> Result<&ConnectionManager, CoreError> {
        self.ensure_live()?;
        Ok(&self.connection)
    }

    /// The alert queue. Fails once the hub has been shut down.
    pub fn alerts(&self) -> Result<&AlertQueue, CoreError> {
        self.ensure_live()?;
        Ok(&self.alerts)
    }

    /// Close the connection, cancel the reconnect timer, and abort every
    /// alert timer. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.connection.shutdown();
        self.alerts.shutdown();
        self.cancel.cancel();
        info!("hub shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<(), CoreError> {
        if self.is_shut_down() {
            return Err(CoreError::ShutDown { component: "hub" });
        }
        Ok(())
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("connection", &self.connection)
            .field("alerts", &self.alerts)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
