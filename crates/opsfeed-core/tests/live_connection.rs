//! End-to-end tests against a real local WebSocket server.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use opsfeed_core::{
    ConnectionConfig, ConnectionManager, ConnectionState, ReconnectConfig, WsConnector,
};

const STEP: Duration = Duration::from_secs(5);

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn read_json(ws: &mut WebSocketStream<TcpStream>) -> Option<Value> {
    while let Some(Ok(msg)) = ws.next().await {
        if let Message::Text(text) = msg {
            return Some(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    None
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: &Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

fn subscribe(topic: &str) -> Value {
    json!({"type": "subscribe", "endpoint": topic})
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resubscribes_exactly_once_after_server_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = ConnectionConfig::new(&format!("ws://{addr}/ws")).unwrap();
    config.reconnect = ReconnectConfig::fixed(Duration::from_millis(200));
    let manager = ConnectionManager::new(config, WsConnector::default());
    let mut messages = manager.messages();

    manager.subscribe("process");
    manager.subscribe("quality");
    manager.connect().unwrap();

    // First session: topics arrive on open, then the server drops us.
    let mut first = timeout(STEP, accept(&listener)).await.unwrap();
    assert_eq!(read_json(&mut first).await, Some(subscribe("process")));
    assert_eq!(read_json(&mut first).await, Some(subscribe("quality")));
    send_json(&mut first, &json!({"seq": 1})).await;

    let payload = timeout(STEP, messages.recv()).await.unwrap().unwrap();
    assert_eq!(*payload, json!({"seq": 1}));
    first.close(None).await.unwrap();
    drop(first);

    // Second session: same topics, each exactly once.
    let mut second = timeout(STEP, accept(&listener)).await.unwrap();
    assert_eq!(read_json(&mut second).await, Some(subscribe("process")));
    assert_eq!(read_json(&mut second).await, Some(subscribe("quality")));
    assert!(
        timeout(Duration::from_millis(300), read_json(&mut second))
            .await
            .is_err(),
        "no duplicate subscribe frames"
    );

    send_json(&mut second, &json!({"seq": 2})).await;
    let payload = timeout(STEP, messages.recv()).await.unwrap().unwrap();
    assert_eq!(*payload, json!({"seq": 2}));
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.last_message().as_deref(), Some(&json!({"seq": 2})));

    manager.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn outbound_frames_reach_the_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ConnectionConfig::new(&format!("ws://{addr}/ws")).unwrap();
    let manager = ConnectionManager::new(config, WsConnector::default());
    let mut feed = manager.watch(Some("sales")).unwrap();

    let mut ws = timeout(STEP, accept(&listener)).await.unwrap();
    assert_eq!(read_json(&mut ws).await, Some(subscribe("sales")));

    timeout(STEP, async {
        while feed.status() != ConnectionState::Connected {
            feed.status_changed().await;
        }
    })
    .await
    .unwrap();

    assert!(manager.send(&json!({"type": "ack", "id": 7})));
    assert_eq!(read_json(&mut ws).await, Some(json!({"type": "ack", "id": 7})));

    drop(feed);
    assert_eq!(
        read_json(&mut ws).await,
        Some(json!({"type": "unsubscribe", "endpoint": "sales"}))
    );

    manager.shutdown();
}
