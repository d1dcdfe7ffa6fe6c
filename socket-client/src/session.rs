//! 长连接会话实现

use crate::dispatcher::{EventDispatcher, SubscriptionId};
use crate::error::SocketError;
use crate::events::{encode_outbound, heartbeat_frame};
use crate::message::ChatMessage;
use crate::pending::PendingRequests;
use crate::router::InboundRouter;
use api_client::{ClientError, RequestTransport};
use futures::stream::{SplitSink, SplitStream};
use futures::{Future, SinkExt, StreamExt};
use native_tls::Certificate;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type SharedSink = Arc<Mutex<Option<WsSink>>>;
type SharedState = Arc<std::sync::RwLock<ConnectionState>>;

/// TLS 配置
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// 额外信任的 CA 证书 (PEM)
    pub ca_cert_path: Option<PathBuf>,
    /// 是否跳过服务器证书验证（仅开发用）
    pub danger_accept_invalid_certs: bool,
}

/// 长连接配置
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// 服务器 URL
    pub url: String,
    /// 连接路径，同时用于签名
    pub path: String,
    /// 心跳间隔
    pub heartbeat_interval: Duration,
    /// 等待 ack 的超时，`None` 表示不限
    pub ack_timeout: Option<Duration>,
    /// TLS 配置
    pub tls: TlsConfig,
}

impl Default for SocketConfig {
    fn default() -> Self {
        // 从环境变量读取配置，默认官方地址
        Self {
            url: std::env::var("PROJZ_WS_URL").unwrap_or_else(|_| "wss://ws.projz.com".to_string()),
            path: "/v1/chat/ws".to_string(),
            heartbeat_interval: Duration::from_secs(3),
            ack_timeout: Some(Duration::from_secs(30)),
            tls: TlsConfig::default(),
        }
    }
}

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// 长连接会话
///
/// 连接断开后不会自动重连，需要重新调用 [`DuplexSession::connect`]。
pub struct DuplexSession {
    config: SocketConfig,
    transport: Arc<RequestTransport>,
    dispatcher: Arc<EventDispatcher<ChatMessage>>,
    pending: Arc<PendingRequests>,
    state: SharedState,
    sink: SharedSink,
    /// 接收任务句柄
    receiver_handle: Arc<RwLock<Option<JoinHandle<()>>>>,
    /// 心跳任务句柄
    heartbeat_handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl DuplexSession {
    /// 创建会话
    pub fn new(
        transport: Arc<RequestTransport>,
        dispatcher: Arc<EventDispatcher<ChatMessage>>,
        config: SocketConfig,
    ) -> Self {
        Self {
            config,
            transport,
            dispatcher,
            pending: Arc::new(PendingRequests::new()),
            state: Arc::new(std::sync::RwLock::new(ConnectionState::Disconnected)),
            sink: Arc::new(Mutex::new(None)),
            receiver_handle: Arc::new(RwLock::new(None)),
            heartbeat_handle: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher<ChatMessage>> {
        &self.dispatcher
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// 等待 ack 的请求数量
    pub async fn pending_count(&self) -> usize {
        self.pending.len().await
    }

    /// 订阅全部聊天消息
    pub fn subscribe<H, Fut>(&self, handler: H) -> SubscriptionId
    where
        H: Fn(ChatMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatcher.subscribe_all(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// 构建 TLS 连接器，未配置时使用默认连接器
    fn build_tls_connector(&self) -> Result<Option<Connector>, SocketError> {
        let tls = &self.config.tls;
        if tls.ca_cert_path.is_none() && !tls.danger_accept_invalid_certs {
            return Ok(None);
        }

        let mut builder = native_tls::TlsConnector::builder();

        if let Some(ca_path) = &tls.ca_cert_path {
            info!("[DuplexSession] Trusting CA certificate {:?}", ca_path);
            let pem = fs::read(ca_path)
                .map_err(|e| SocketError::Tls(format!("Failed to read CA cert: {}", e)))?;
            let cert = Certificate::from_pem(&pem)
                .map_err(|e| SocketError::Tls(format!("Invalid CA cert: {}", e)))?;
            builder.add_root_certificate(cert);
        }

        if tls.danger_accept_invalid_certs {
            warn!("[DuplexSession] Accepting invalid TLS certificates");
            builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map(|connector| Some(Connector::NativeTls(connector)))
            .map_err(|e| SocketError::Tls(format!("Failed to build TLS connector: {}", e)))
    }

    /// 连接到服务器
    ///
    /// 只能在 `Disconnected` 状态下调用，失败后状态回到 `Disconnected`。
    pub async fn connect(&self) -> Result<(), SocketError> {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state != ConnectionState::Disconnected {
                return Err(SocketError::AlreadyConnected);
            }
            *state = ConnectionState::Connecting;
        }

        match self.open().await {
            Ok(stream) => {
                self.start(stream).await;
                Ok(())
            }
            Err(e) => {
                error!("[DuplexSession] Connect failed: {}", e);
                set_state(&self.state, ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// 握手，请求头按连接路径签名
    async fn open(&self) -> Result<WsStream, SocketError> {
        let url = format!("{}{}", self.config.url.trim_end_matches('/'), self.config.path);
        info!("[DuplexSession] Connecting to {}", url);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| SocketError::InvalidUrl(format!("{}: {}", url, e)))?;

        let headers = self.transport.build_headers(&self.config.path, &[], &[])?;
        for (name, value) in &headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidHeader(format!("{}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidHeader(format!("{}: {}", value, e)))?;
            request.headers_mut().insert(name, value);
        }

        let connector = self.build_tls_connector()?;
        let (stream, response) = connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|e| SocketError::ConnectionFailed(e.to_string()))?;
        debug!("[DuplexSession] Handshake status {}", response.status());
        Ok(stream)
    }

    /// 启动接收和心跳任务
    async fn start(&self, stream: WsStream) {
        self.stop_tasks().await;

        let (sink, stream) = stream.split();
        *self.sink.lock().await = Some(sink);
        set_state(&self.state, ConnectionState::Connected);
        info!("[DuplexSession] Connected");

        let router = InboundRouter::new(self.pending.clone(), self.dispatcher.clone());
        let receiver = tokio::spawn(receive_loop(
            stream,
            router,
            self.state.clone(),
            self.sink.clone(),
            self.pending.clone(),
        ));
        let heartbeat = tokio::spawn(heartbeat_loop(
            self.sink.clone(),
            self.config.heartbeat_interval,
        ));

        *self.receiver_handle.write().await = Some(receiver);
        *self.heartbeat_handle.write().await = Some(heartbeat);
    }

    async fn stop_tasks(&self) {
        if let Some(handle) = self.receiver_handle.write().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.heartbeat_handle.write().await.take() {
            handle.abort();
            debug!("[DuplexSession] Heartbeat task stopped");
        }
    }

    /// 断开连接，所有等待中的请求以 [`SocketError::ConnectionClosed`] 失败
    ///
    /// 可重复调用。
    pub async fn disconnect(&self) {
        self.stop_tasks().await;

        if let Some(mut sink) = self.sink.lock().await.take() {
            // 对端可能已经断开
            if tokio::time::timeout(Duration::from_secs(1), sink.close())
                .await
                .is_err()
            {
                debug!("[DuplexSession] Close frame timed out");
            }
        }

        let failed = self.pending.fail_all().await;
        let previous = std::mem::replace(
            &mut *self.state.write().unwrap_or_else(PoisonError::into_inner),
            ConnectionState::Disconnected,
        );
        if previous != ConnectionState::Disconnected {
            info!("[DuplexSession] Disconnected ({} pending requests failed)", failed);
        }
    }

    /// 发送请求 `{"t": event_type, ...payload}`
    ///
    /// `wait_for_ack` 为 true 时必须提供 `seq_id`，返回匹配的 serverAck 对象。
    pub async fn send_request(
        &self,
        event_type: i64,
        wait_for_ack: bool,
        seq_id: Option<i64>,
        payload: Map<String, Value>,
    ) -> Result<Option<Value>, SocketError> {
        let ack_seq_id = match (wait_for_ack, seq_id) {
            (true, None) => return Err(SocketError::MissingSeqId),
            (true, Some(id)) => Some(id),
            (false, _) => None,
        };
        if !self.is_connected() {
            return Err(SocketError::NotConnected);
        }

        let text = encode_outbound(event_type, payload)?;

        // 先登记再发送，ack 可能在 send 返回前到达
        let receiver = match ack_seq_id {
            Some(id) => Some(self.pending.register(id).await),
            None => None,
        };

        if let Err(e) = send_text(&self.sink, text).await {
            if let Some(id) = ack_seq_id {
                self.pending.remove(id).await;
            }
            warn!("[DuplexSession] Send failed: {}", e);
            return Err(e);
        }

        let (Some(seq_id), Some(receiver)) = (ack_seq_id, receiver) else {
            return Ok(None);
        };

        let outcome = match self.config.ack_timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.remove(seq_id).await;
                    warn!("[DuplexSession] Ack timeout for seqId {}", seq_id);
                    return Err(SocketError::AckTimeout);
                }
            },
            None => receiver.await,
        };

        // 发送端被丢弃说明连接已关闭
        outcome.map_err(|_| SocketError::ConnectionClosed)?.map(Some)
    }
}

impl Drop for DuplexSession {
    fn drop(&mut self) {
        for handle in [&self.receiver_handle, &self.heartbeat_handle] {
            if let Ok(mut guard) = handle.try_write() {
                if let Some(handle) = guard.take() {
                    handle.abort();
                }
            }
        }
    }
}

fn set_state(state: &SharedState, value: ConnectionState) {
    *state.write().unwrap_or_else(PoisonError::into_inner) = value;
}

async fn send_text(sink: &SharedSink, text: String) -> Result<(), SocketError> {
    let mut guard = sink.lock().await;
    let sink = guard.as_mut().ok_or(SocketError::NotConnected)?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| SocketError::SendFailed(e.to_string()))
}

async fn receive_loop(
    mut stream: SplitStream<WsStream>,
    router: InboundRouter,
    state: SharedState,
    sink: SharedSink,
    pending: Arc<PendingRequests>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                router.route(&text).await;
            }
            Ok(Message::Close(frame)) => {
                info!("[DuplexSession] Server closed connection: {:?}", frame);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("[DuplexSession] Read error: {}", e);
                break;
            }
        }
    }

    sink.lock().await.take();
    let failed = pending.fail_all().await;
    set_state(&state, ConnectionState::Disconnected);
    warn!("[DuplexSession] Connection lost ({} pending requests failed)", failed);
}

async fn heartbeat_loop(sink: SharedSink, interval: Duration) {
    let frame = match heartbeat_frame() {
        Ok(frame) => frame,
        Err(e) => {
            error!("[DuplexSession] Can't encode heartbeat: {}", e);
            return;
        }
    };

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    loop {
        ticker.tick().await;
        match send_text(&sink, frame.clone()).await {
            Ok(()) => debug!("[DuplexSession] Heartbeat sent"),
            Err(SocketError::NotConnected) => {
                debug!("[DuplexSession] Heartbeat stopped, not connected");
                break;
            }
            Err(e) => warn!("[DuplexSession] Heartbeat failed: {}", e),
        }
    }
}
