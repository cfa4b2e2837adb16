mod common;

use common::{MockGateway, STEP_TIMEOUT, TOKEN};
use cordwire::gateway::{AuthMode, ConnectionState};
use cordwire::{Client, ConnectionClosed, SessionReady};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

/// Forwards every ConnectionClosed posted on the client's bus.
fn watch_closes(client: &Client) -> mpsc::UnboundedReceiver<ConnectionClosed> {
    let (tx, rx) = mpsc::unbounded_channel();
    client
        .events()
        .register::<ConnectionClosed, _>(0, move |closed| {
            let _ = tx.send(closed.clone());
            Ok(())
        });
    rx
}

fn watch_ready(client: &Client) -> mpsc::UnboundedReceiver<SessionReady> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.events().register::<SessionReady, _>(0, move |ready| {
        let _ = tx.send(ready.clone());
        Ok(())
    });
    rx
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(STEP_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_identify_then_resume_after_reconnect() {
    let mut gateway = MockGateway::spawn().await;
    let mut client = Client::new(common::test_config(&gateway.addr, "127.0.0.1:1"));
    let mut closes = watch_closes(&client);
    let mut ready = watch_ready(&client);
    client.start().unwrap();

    let mut first = gateway.accept().await;
    first.hello(45_000);
    let identify = first.next_command().await;
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], TOKEN);
    assert_eq!(identify["d"]["properties"]["$browser"], "cordwire");

    first.dispatch("READY", 1, json!({ "session_id": "abc", "v": 6, "user": { "id": "1" } }));
    let session = recv(&mut ready).await;
    assert_eq!(session.session_id, "abc");
    assert_eq!(session.version, Some(6));
    assert!(session.guilds.is_empty());
    assert_eq!(client.gateway().state(), ConnectionState::Connected);

    first.close(4009, "Session timed out");
    let closed = recv(&mut closes).await;
    assert_eq!(closed.code, 4009);
    assert_eq!(closed.reason, "Session timed out");

    let mut second = gateway.accept().await;
    second.hello(45_000);
    let resume = second.next_command().await;
    assert_eq!(resume["op"], 6);
    assert_eq!(
        resume["d"],
        json!({ "token": TOKEN, "session_id": "abc", "seq": 1 })
    );

    client.stop().await.unwrap();
    let closed = recv(&mut closes).await;
    assert_eq!(closed.code, 1000);
    assert_eq!(closed.reason, "Disconnecting");
    assert_eq!(client.gateway().state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_invalid_session_forces_fresh_identify() {
    let mut gateway = MockGateway::spawn().await;
    let mut client = Client::new(common::test_config(&gateway.addr, "127.0.0.1:1"));
    let mut closes = watch_closes(&client);
    let mut ready = watch_ready(&client);
    client.start().unwrap();

    let mut first = gateway.accept().await;
    first.hello(45_000);
    assert_eq!(first.next_command().await["op"], 2);
    first.dispatch("READY", 1, json!({ "session_id": "abc" }));
    recv(&mut ready).await;

    first.send(json!({ "op": 9, "d": false }));
    let closed = recv(&mut closes).await;
    assert_eq!(closed.code, 4000);
    assert_eq!(closed.reason, "Invalid session");

    let mut second = gateway.accept().await;
    second.hello(45_000);
    let handshake = second.next_command().await;
    assert_eq!(handshake["op"], 2, "expected IDENTIFY, got {handshake}");

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_missing_acks_close_as_failed_connection() {
    let mut gateway = MockGateway::spawn().await;
    let mut client = Client::new(common::test_config(&gateway.addr, "127.0.0.1:1"));
    let mut closes = watch_closes(&client);
    client.start().unwrap();

    let mut first = gateway.accept().await;
    first.hello(50);
    // IDENTIFY and the first beat may arrive in either order
    loop {
        let frame = first.next_frame().await;
        if frame["op"] == 1 {
            assert_eq!(frame, json!({ "op": 1, "d": null }));
            break;
        }
    }
    first.send(json!({ "op": 11 }));

    let closed = recv(&mut closes).await;
    assert_eq!(closed.code, 4000);
    assert_eq!(closed.reason, "Failed connection");

    let _second = gateway.accept().await;
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_server_heartbeat_request_is_answered() {
    let mut gateway = MockGateway::spawn().await;
    let mut client = Client::new(common::test_config(&gateway.addr, "127.0.0.1:1"));
    client.start().unwrap();

    let mut socket = gateway.accept().await;
    socket.send(json!({ "op": 1, "d": null }));
    let beat = socket.next_frame().await;
    assert_eq!(beat["op"], 1);

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_no_reconnect_when_disabled() {
    let mut gateway = MockGateway::spawn().await;
    let mut config = common::test_config(&gateway.addr, "127.0.0.1:1");
    config.auto_reconnect = false;
    let mut client = Client::new(config);
    let mut closes = watch_closes(&client);
    client.start().unwrap();

    let socket = gateway.accept().await;
    socket.close(4000, "Unknown error");

    let closed = recv(&mut closes).await;
    assert_eq!(closed.code, 4000);
    tokio::time::timeout(STEP_TIMEOUT, client.join())
        .await
        .expect("gateway loop kept running")
        .unwrap();
}

#[tokio::test]
async fn test_dropped_stream_closes_abnormally_and_reconnects() {
    let mut gateway = MockGateway::spawn().await;
    let mut client = Client::new(common::test_config(&gateway.addr, "127.0.0.1:1"));
    let mut closes = watch_closes(&client);
    client.start().unwrap();

    let first = gateway.accept().await;
    first.hello(45_000);
    first.drop_connection();

    let closed = recv(&mut closes).await;
    assert_eq!(
        closed,
        ConnectionClosed {
            code: 1006,
            reason: "Connection lost".to_string()
        }
    );

    let _second = gateway.accept().await;
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_close_without_status_reconnects() {
    let mut gateway = MockGateway::spawn().await;
    let mut client = Client::new(common::test_config(&gateway.addr, "127.0.0.1:1"));
    let mut closes = watch_closes(&client);
    client.start().unwrap();

    let first = gateway.accept().await;
    first.close_without_status();

    let closed = recv(&mut closes).await;
    assert_eq!(closed.code, 1005);

    let _second = gateway.accept().await;
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_close_requested_between_sockets_is_not_replayed() {
    let mut gateway = MockGateway::spawn().await;
    let mut config = common::test_config(&gateway.addr, "127.0.0.1:1");
    config.invalid_session_backoff = Duration::from_millis(300)..=Duration::from_millis(300);
    let mut client = Client::new(config);
    let mut closes = watch_closes(&client);
    client.start().unwrap();

    let mut first = gateway.accept().await;
    first.hello(45_000);
    assert_eq!(first.next_command().await["op"], 2);

    // Lands while the client waits out the invalid session
    first.send(json!({ "op": 9, "d": false }));
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.gateway().close(4321, "Requested during backoff");

    let closed = recv(&mut closes).await;
    assert_eq!(closed.code, 4000);
    assert_eq!(closed.reason, "Invalid session");

    let mut second = gateway.accept().await;
    second.hello(45_000);
    assert_eq!(second.next_command().await["op"], 2);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(closes.try_recv().is_err(), "fresh connection was closed");
    assert_eq!(
        client.gateway().state(),
        ConnectionState::Authenticating(AuthMode::Identify)
    );

    client.stop().await.unwrap();
    assert_eq!(recv(&mut closes).await.code, 1000);
}
