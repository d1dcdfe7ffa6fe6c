//! DuplexSession 与本地 WebSocket 服务端的端到端测试

use api_client::{ApiConfig, ApiErrorKind, RequestTransport};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use socket_client::{
    ChatMessage, ConnectionState, DuplexSession, EventDispatcher, SocketConfig, SocketError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

enum ServerCommand {
    Send(Value),
    Close,
}

struct TestServer {
    url: String,
    inbound: mpsc::UnboundedReceiver<Value>,
    commands: mpsc::UnboundedSender<ServerCommand>,
    headers: mpsc::UnboundedReceiver<Vec<String>>,
}

impl TestServer {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (commands, mut commands_rx) = mpsc::unbounded_channel();
        let (headers_tx, headers) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let callback = move |request: &Request,
                                 response: Response|
                  -> Result<Response, ErrorResponse> {
                let names: Vec<String> = request
                    .headers()
                    .keys()
                    .map(|name| name.as_str().to_string())
                    .collect();
                let _ = headers_tx.send(names);
                Ok(response)
            };
            let ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
                .await
                .unwrap();
            let (mut sink, mut stream) = ws.split();

            loop {
                tokio::select! {
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let _ = inbound_tx.send(serde_json::from_str(&text).unwrap());
                        }
                        Some(Ok(_)) => {}
                        _ => break,
                    },
                    command = commands_rx.recv() => match command {
                        Some(ServerCommand::Send(value)) => {
                            let _ = sink.send(Message::Text(value.to_string())).await;
                        }
                        Some(ServerCommand::Close) | None => {
                            let _ = sink.close().await;
                            break;
                        }
                    },
                }
            }
        });

        Self {
            url,
            inbound,
            commands,
            headers,
        }
    }

    fn send(&self, value: Value) {
        let _ = self.commands.send(ServerCommand::Send(value));
    }

    fn close(&self) {
        let _ = self.commands.send(ServerCommand::Close);
    }

    /// 下一个非心跳帧
    async fn next_request(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.inbound.recv())
                .await
                .expect("timed out waiting for frame")
                .expect("server stopped");
            if frame["t"] != 8 {
                return frame;
            }
        }
    }
}

fn config(url: &str) -> SocketConfig {
    SocketConfig {
        url: url.to_string(),
        heartbeat_interval: Duration::from_secs(3600),
        ack_timeout: Some(Duration::from_secs(5)),
        ..SocketConfig::default()
    }
}

async fn connected(config: SocketConfig) -> Arc<DuplexSession> {
    let transport = Arc::new(RequestTransport::new(ApiConfig::default()).unwrap());
    let session = Arc::new(DuplexSession::new(
        transport,
        Arc::new(EventDispatcher::new()),
        config,
    ));
    session.connect().await.unwrap();
    session
}

fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn spawn_request(
    session: &Arc<DuplexSession>,
    seq_id: i64,
) -> tokio::task::JoinHandle<Result<Option<Value>, SocketError>> {
    let session = session.clone();
    tokio::spawn(async move {
        session
            .send_request(1, true, Some(seq_id), payload(json!({"threadId": 7, "msg": {"seqId": seq_id}})))
            .await
    })
}

#[tokio::test]
async fn test_handshake_is_signed() {
    let mut server = TestServer::spawn().await;
    let session = connected(config(&server.url)).await;
    assert!(session.is_connected());

    let headers = server.headers.recv().await.unwrap();
    for name in ["hjtrfs", "rawdeviceid", "nonce", "reqtime", "x-forwarded-for", "apptype"] {
        assert!(headers.iter().any(|h| h == name), "missing header {}", name);
    }

    assert!(matches!(
        session.connect().await,
        Err(SocketError::AlreadyConnected)
    ));
}

#[tokio::test]
async fn test_ack_resolves_request() {
    let mut server = TestServer::spawn().await;
    let session = connected(config(&server.url)).await;

    let request = spawn_request(&session, 42);
    let frame = server.next_request().await;
    assert_eq!(frame["t"], 1);
    assert_eq!(frame["threadId"], 7);
    assert_eq!(frame["msg"]["seqId"], 42);

    server.send(json!({"t": 2, "serverAck": {"seqId": 42, "apiCode": 0, "threadId": 7, "messageId": "m1"}}));

    let ack = request.await.unwrap().unwrap().unwrap();
    assert_eq!(ack["threadId"], 7);
    assert_eq!(ack["messageId"], "m1");
    assert_eq!(session.pending_count().await, 0);
}

#[tokio::test]
async fn test_error_ack_raises_api_error() {
    let mut server = TestServer::spawn().await;
    let session = connected(config(&server.url)).await;

    let request = spawn_request(&session, 43);
    server.next_request().await;
    server.send(json!({"t": 2, "serverAck": {"seqId": 43, "apiCode": 2009, "apiMsg": "bad"}}));

    match request.await.unwrap() {
        Err(SocketError::Api(err)) => {
            assert_eq!(err.kind, ApiErrorKind::InvalidEmail);
            assert_eq!(err.message, "bad");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_acks_resolve_out_of_order() {
    let mut server = TestServer::spawn().await;
    let session = connected(config(&server.url)).await;

    let first = spawn_request(&session, 1);
    server.next_request().await;
    let second = spawn_request(&session, 2);
    server.next_request().await;

    server.send(json!({"t": 2, "serverAck": {"seqId": 2, "apiCode": 0, "order": "second"}}));
    let second = second.await.unwrap().unwrap().unwrap();
    assert_eq!(second["order"], "second");
    assert!(!first.is_finished());

    server.send(json!({"t": 2, "serverAck": {"seqId": 1, "apiCode": 0, "order": "first"}}));
    let first = first.await.unwrap().unwrap().unwrap();
    assert_eq!(first["order"], "first");
}

#[tokio::test]
async fn test_unknown_ack_and_bad_frames_keep_session_alive() {
    let mut server = TestServer::spawn().await;
    let session = connected(config(&server.url)).await;

    server.send(json!({"t": 2, "serverAck": {"seqId": 999, "apiCode": 0}}));
    server.send(json!({"t": 13, "push": {}}));
    server.send(json!({"t": 1, "msg": "broken"}));
    server.send(json!("just a string"));

    let request = spawn_request(&session, 5);
    server.next_request().await;
    server.send(json!({"t": 2, "serverAck": {"seqId": 5, "apiCode": 0}}));
    assert!(request.await.unwrap().unwrap().is_some());
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_disconnect_fails_pending_requests() {
    let mut server = TestServer::spawn().await;
    let session = connected(config(&server.url)).await;

    let request = spawn_request(&session, 9);
    server.next_request().await;
    session.disconnect().await;

    assert!(matches!(
        request.await.unwrap(),
        Err(SocketError::ConnectionClosed)
    ));
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(matches!(
        session.send_request(8, false, None, Map::new()).await,
        Err(SocketError::NotConnected)
    ));

    session.disconnect().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_server_close_fails_pending_requests() {
    let mut server = TestServer::spawn().await;
    let session = connected(config(&server.url)).await;

    let request = spawn_request(&session, 10);
    server.next_request().await;
    server.close();

    assert!(matches!(
        request.await.unwrap(),
        Err(SocketError::ConnectionClosed)
    ));
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_ack_timeout_removes_slot() {
    let mut server = TestServer::spawn().await;
    let session = connected(SocketConfig {
        ack_timeout: Some(Duration::from_millis(100)),
        ..config(&server.url)
    })
    .await;

    let request = spawn_request(&session, 11);
    server.next_request().await;

    assert!(matches!(request.await.unwrap(), Err(SocketError::AckTimeout)));
    assert_eq!(session.pending_count().await, 0);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_fire_and_forget_returns_immediately() {
    let mut server = TestServer::spawn().await;
    let session = connected(config(&server.url)).await;

    let result = session
        .send_request(3, false, Some(1), payload(json!({"hello": "world"})))
        .await
        .unwrap();
    assert_eq!(result, None);
    assert_eq!(session.pending_count().await, 0);

    let frame = server.next_request().await;
    assert_eq!(frame, json!({"t": 3, "hello": "world"}));
}

#[tokio::test]
async fn test_push_message_reaches_subscribers() {
    let server = TestServer::spawn().await;
    let session = connected(config(&server.url)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.subscribe(move |msg: ChatMessage| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(msg);
        }
    });

    server.send(json!({"t": 13, "push": {"content": "ignored"}}));
    server.send(json!({"t": 1, "msg": {"threadId": 7, "content": "hello", "createdTime": 1700000000}}));

    let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.thread_id, Some(7));
    assert_eq!(msg.content.as_deref(), Some("hello"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_heartbeat_is_sent_periodically() {
    let mut server = TestServer::spawn().await;
    let _session = connected(SocketConfig {
        heartbeat_interval: Duration::from_millis(50),
        ..config(&server.url)
    })
    .await;

    for _ in 0..2 {
        let frame = tokio::time::timeout(Duration::from_secs(5), server.inbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, json!({"t": 8}));
    }
}
