//! Websocket transport against an in-process node.

mod common;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use common::CHAIN_ID;
use dcore_client::net::{Api, Endpoint, RpcChannel, RpcError, Transport, WsTransport};

/// Answer the handshake and a few calls. `echo_api` returns the API id it was routed to.
fn answer(api_id: u64, method: &str, login_ok: bool) -> Result<Value, String> {
    match (api_id, method) {
        (1, "login") => Ok(json!(login_ok)),
        (1, "database") => Ok(json!(2)),
        (1, "history") => Ok(json!(3)),
        (1, "network_broadcast") => Ok(json!(4)),
        (1, "messaging") => Err("API messaging not registered".to_string()),
        (2, "get_chain_id") => Ok(json!(CHAIN_ID)),
        (_, "echo_api") => Ok(json!(api_id)),
        (_, "hang_up") => Err("__close__".to_string()),
        (_, other) => Err(format!("no method {}", other)),
    }
}

async fn spawn_node(login_ok: bool) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                socket
                    .send(Message::Text(json!({"method": "notice", "params": [0, []]}).to_string().into()))
                    .await
                    .ok();
                while let Some(Ok(message)) = socket.next().await {
                    let Message::Text(text) = message else { continue };
                    let request: Value = serde_json::from_str(&text).unwrap();
                    let id = request["id"].clone();
                    let api_id = request["params"][0].as_u64().unwrap();
                    let method = request["params"][1].as_str().unwrap().to_string();

                    let reply = match answer(api_id, &method, login_ok) {
                        Ok(result) => json!({ "id": id, "result": result }),
                        Err(message) if message == "__close__" => {
                            let _ = socket.close(None).await;
                            return;
                        }
                        Err(message) => json!({ "id": id, "error": { "message": message } }),
                    };
                    if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    addr
}

fn endpoint_for(addr: SocketAddr) -> Endpoint {
    Endpoint::parse(&format!("ws://{}", addr)).unwrap()
}

#[tokio::test]
async fn test_handshake_resolves_api_ids() {
    let addr = spawn_node(true).await;
    let channel = WsTransport::new().connect(&endpoint_for(addr)).await.unwrap();

    assert_eq!(*channel.status().borrow(), "open");
    assert_eq!(channel.execute(Api::Database, "echo_api", Vec::new()).await.unwrap(), json!(2));
    assert_eq!(channel.execute(Api::History, "echo_api", Vec::new()).await.unwrap(), json!(3));
    assert_eq!(
        channel.execute(Api::NetworkBroadcast, "echo_api", Vec::new()).await.unwrap(),
        json!(4)
    );

    // Messaging was refused during the handshake; the channel still works without it.
    let err = channel.execute(Api::Messaging, "echo_api", Vec::new()).await.unwrap_err();
    assert!(matches!(err, RpcError::Transport(_)));

    channel.close().await;
    assert_eq!(*channel.status().borrow(), "closed");
}

#[tokio::test]
async fn test_remote_errors_and_concurrent_calls() {
    let addr = spawn_node(true).await;
    let channel = WsTransport::new().connect(&endpoint_for(addr)).await.unwrap();

    let (chain_id, missing) = tokio::join!(
        channel.execute(Api::Database, "get_chain_id", Vec::new()),
        channel.execute(Api::Database, "get_nothing", Vec::new()),
    );
    assert_eq!(chain_id.unwrap(), json!(CHAIN_ID));
    assert_eq!(
        missing.unwrap_err(),
        RpcError::Remote {
            message: "no method get_nothing".into()
        }
    );
}

#[tokio::test]
async fn test_refused_login_fails_the_attempt() {
    let addr = spawn_node(false).await;
    let err = WsTransport::new().connect(&endpoint_for(addr)).await.err().unwrap();
    assert!(matches!(err, RpcError::Remote { message } if message.contains("Login refused")));
}

#[tokio::test]
async fn test_server_close_fails_pending_call() {
    let addr = spawn_node(true).await;
    let channel = WsTransport::new().connect(&endpoint_for(addr)).await.unwrap();
    let mut status = channel.status();

    let err = channel.execute(Api::Database, "hang_up", Vec::new()).await.unwrap_err();
    assert_eq!(err, RpcError::Closed);

    status.wait_for(|raw| raw == "closed").await.unwrap();
}

#[tokio::test]
async fn test_call_after_server_close_fails_fast() {
    let addr = spawn_node(true).await;
    let channel = WsTransport::new().connect(&endpoint_for(addr)).await.unwrap();
    let mut status = channel.status();

    let _ = channel.execute(Api::Database, "hang_up", Vec::new()).await;
    status.wait_for(|raw| raw == "closed").await.unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        channel.execute(Api::Database, "get_chain_id", Vec::new()),
    )
    .await
    .expect("call after close should not wait for a reply");
    assert_eq!(result.unwrap_err(), RpcError::Closed);
}

#[tokio::test]
async fn test_call_after_local_close_fails_fast() {
    let addr = spawn_node(true).await;
    let channel = WsTransport::new().connect(&endpoint_for(addr)).await.unwrap();
    channel.close().await;

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        channel.execute(Api::Database, "get_chain_id", Vec::new()),
    )
    .await
    .expect("call after close should not wait for a reply");
    assert_eq!(result.unwrap_err(), RpcError::Closed);
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = WsTransport::new().connect(&endpoint_for(addr)).await.err().unwrap();
    assert!(matches!(err, RpcError::Transport(_)));
}
