//! `opsfeed send`: one-shot connection that delivers a single frame.
//!
//! Opens a transport session directly rather than through the connection
//! manager, so there is no reconnect loop and the frame is flushed before
//! the process exits.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tracing::debug;

use opsfeed_api::protocol;
use opsfeed_core::{Connector, CoreError, TransportEvent, WsConnector};

use crate::cli::{GlobalOpts, SendArgs};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let payload: Value = serde_json::from_str(&args.json)?;
    let text = protocol::encode_message(&payload).map_err(CoreError::from)?;

    let cfg = config::load(global)?;
    let endpoint = config::hub_config(global, &cfg)?.connection.endpoint;
    let url = endpoint.to_string();

    let (outbound, mut events) = WsConnector::default().open(&endpoint).into_parts();

    match timeout(args.wait, wait_open(&mut events)).await {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => return Err(CliError::ConnectionFailed { url, reason }),
        Err(_) => {
            return Err(CliError::Timeout {
                what: format!("connection to {url}"),
                seconds: args.wait.as_secs(),
            });
        }
    }

    let bytes = text.len();
    if outbound.send(text).is_err() {
        return Err(CliError::ConnectionFailed {
            url,
            reason: "connection closed before the frame was sent".into(),
        });
    }
    // Releasing the sender makes the driver flush, send a close frame, and
    // report Close.
    drop(outbound);
    if timeout(args.wait.max(Duration::from_secs(1)), wait_close(&mut events))
        .await
        .is_err()
    {
        debug!(url = %url, "server did not acknowledge close");
    }

    if !global.quiet {
        eprintln!("sent {bytes} bytes to {url}");
    }
    Ok(())
}

/// Wait for `Open`. Any `Close` before it is a connection failure; the
/// preceding `Error` supplies the reason when there is one.
async fn wait_open(events: &mut UnboundedReceiver<TransportEvent>) -> Result<(), String> {
    let mut last_error = None;
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Open => return Ok(()),
            TransportEvent::Error(reason) => last_error = Some(reason),
            TransportEvent::Close { code, reason } => {
                return Err(last_error.unwrap_or_else(|| format!("closed with code {code}: {reason}")));
            }
            TransportEvent::Message(_) => {}
        }
    }
    Err(last_error.unwrap_or_else(|| "transport driver exited".into()))
}

async fn wait_close(events: &mut UnboundedReceiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        if matches!(event, TransportEvent::Close { .. }) {
            return;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use opsfeed_core::Session;

    #[tokio::test]
    async fn open_after_noise_succeeds() {
        let (session, peer) = Session::pair();
        let (_outbound, mut events) = session.into_parts();
        peer.emit(TransportEvent::Message("{}".into()));
        peer.emit(TransportEvent::Open);

        assert_eq!(wait_open(&mut events).await, Ok(()));
    }

    #[tokio::test]
    async fn close_before_open_reports_the_error() {
        let (session, peer) = Session::pair();
        let (_outbound, mut events) = session.into_parts();
        peer.emit(TransportEvent::Error("connection refused".into()));
        peer.emit(TransportEvent::Close {
            code: 1006,
            reason: "connection refused".into(),
        });

        assert_eq!(wait_open(&mut events).await.unwrap_err(), "connection refused");
    }

    #[tokio::test]
    async fn driver_gone_is_a_failure() {
        let (session, peer) = Session::pair();
        let (_outbound, mut events) = session.into_parts();
        drop(peer);

        assert!(wait_open(&mut events).await.is_err());
    }
}
