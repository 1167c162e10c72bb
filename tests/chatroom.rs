//! End-to-end tests: real TCP connections against the HTTP server.

use futures_util::{SinkExt, StreamExt};
use socki::api::{serve_listener, ApiConfig, AppState};
use socki::websocket::{Hub, HubConfig, PumpConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    hub: Hub,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
    hub_task: JoinHandle<()>,
}

impl TestServer {
    async fn start(hub_config: HubConfig, pump: PumpConfig) -> Self {
        let shutdown = CancellationToken::new();
        let (hub, hub_task) = Hub::spawn(hub_config, shutdown.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(hub.clone(), pump);

        let server = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                serve_listener(listener, state, &ApiConfig::default(), shutdown)
                    .await
                    .unwrap();
            }
        });

        Self {
            addr,
            hub,
            shutdown,
            server,
            hub_task,
        }
    }

    async fn connect(&self) -> Client {
        let url = format!("ws://{}/api/chatroom", self.addr);
        let (client, _) = connect_async(url).await.unwrap();
        client
    }

    async fn wait_for_members(&self, expected: usize) {
        let mut members = self.hub.watch_members();
        tokio::time::timeout(Duration::from_secs(5), members.wait_for(|n| *n == expected))
            .await
            .expect("member count not reached")
            .unwrap();
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.server.await.unwrap();
        self.hub_task.await.unwrap();
    }
}

/// Next text frame, skipping keepalive traffic
async fn next_text(client: &mut Client) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("no frame received")
            .expect("stream ended")
            .unwrap();
        match frame {
            Message::Text(text) => return text,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Wait until the server closes the connection
async fn expect_closed(client: &mut Client) {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("connection not closed");
        match frame {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(_)) => continue,
        }
    }
}

#[tokio::test]
async fn test_broadcast_reaches_every_client() {
    let server = TestServer::start(HubConfig::default(), PumpConfig::default()).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    let mut carol = server.connect().await;
    server.wait_for_members(3).await;

    alice
        .send(Message::Text("  hello\nworld  ".to_string()))
        .await
        .unwrap();

    assert_eq!(next_text(&mut alice).await, "hello world");
    assert_eq!(next_text(&mut bob).await, "hello world");
    assert_eq!(next_text(&mut carol).await, "hello world");

    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_leaves_room() {
    let server = TestServer::start(HubConfig::default(), PumpConfig::default()).await;

    let mut alice = server.connect().await;
    let bob = server.connect().await;
    server.wait_for_members(2).await;

    drop(bob);
    server.wait_for_members(1).await;

    alice.send(Message::Text("still here".to_string())).await.unwrap();
    assert_eq!(next_text(&mut alice).await, "still here");

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_message_closes_connection() {
    let pump = PumpConfig {
        max_message_size: 16,
        ..PumpConfig::default()
    };
    let server = TestServer::start(HubConfig::default(), pump).await;

    let mut alice = server.connect().await;
    server.wait_for_members(1).await;

    alice.send(Message::Text("x".repeat(64))).await.unwrap();

    expect_closed(&mut alice).await;
    server.wait_for_members(0).await;

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let server = TestServer::start(HubConfig::default(), PumpConfig::default()).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    server.wait_for_members(2).await;

    server.hub.shutdown();

    expect_closed(&mut alice).await;
    expect_closed(&mut bob).await;

    server.stop().await;
}
