//! 客户端入口

use crate::coordinator::SessionAuthCoordinator;
use crate::error::ClientLogicError;
use crate::models::{Account, AuthResult, LoginRequest, MessageDraft, PaginatedList, UserProfile};
use api_client::{ApiConfig, RequestTransport};
use header_signer::SessionState;
use serde_json::{Map, Value};
use socket_client::{ChatMessage, SocketConfig, SubscriptionId, WsEventType};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, ClientLogicError>;

/// Project Z 客户端
pub struct Client {
    transport: Arc<RequestTransport>,
    coordinator: SessionAuthCoordinator,
}

impl Client {
    /// 创建客户端
    pub fn new(api: ApiConfig, socket: SocketConfig) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(RequestTransport::new(api)?), socket))
    }

    /// 使用已有的传输层创建
    pub fn with_transport(transport: Arc<RequestTransport>, socket: SocketConfig) -> Self {
        Self {
            coordinator: SessionAuthCoordinator::new(transport.clone(), socket),
            transport,
        }
    }

    pub fn transport(&self) -> &Arc<RequestTransport> {
        &self.transport
    }

    pub fn session(&self) -> &Arc<SessionState> {
        self.transport.session()
    }

    pub fn coordinator(&self) -> &SessionAuthCoordinator {
        &self.coordinator
    }

    pub fn account(&self) -> Option<Account> {
        self.coordinator.account()
    }

    pub fn user_profile(&self) -> Option<UserProfile> {
        self.coordinator.user_profile()
    }

    // ==================== 登录 ====================

    /// 邮箱登录
    pub async fn login_email(&self, email: &str, password: &str) -> Result<AuthResult> {
        self.login(LoginRequest::email(email, password)).await
    }

    /// 手机号登录
    pub async fn login_phone_number(&self, phone_number: &str, password: &str) -> Result<AuthResult> {
        self.login(LoginRequest::phone_number(phone_number, password))
            .await
    }

    async fn login(&self, request: LoginRequest) -> Result<AuthResult> {
        let response = self.transport.post_json("/v1/auth/login", &request).await?;
        let auth: AuthResult = serde_json::from_value(response)?;
        self.coordinator.on_authenticated(&auth).await?;
        Ok(auth)
    }

    /// 通知服务端登出后清除本地状态
    pub async fn logout(&self) -> Result<()> {
        self.transport.post_empty("/v1/auth/logout").await?;
        self.coordinator.on_logout().await;
        info!("[Client] Logout completed");
        Ok(())
    }

    // ==================== 聊天 ====================

    /// 通过长连接发送消息，ack 后拉取完整消息
    pub async fn send_message(&self, thread_id: i64, draft: MessageDraft) -> Result<ChatMessage> {
        let session = self
            .coordinator
            .current_session()
            .await
            .ok_or(ClientLogicError::NotAuthenticated)?;

        let seq_id = self.transport.entropy().seq_id();
        let uid = self.user_profile().and_then(|profile| profile.uid);

        let mut payload = Map::new();
        payload.insert("threadId".into(), thread_id.into());
        payload.insert(
            "msg".into(),
            Value::Object(draft.to_message(thread_id, uid, seq_id)),
        );

        let ack = session
            .send_request(WsEventType::Message.code(), true, Some(seq_id), payload)
            .await?
            .ok_or_else(|| ClientLogicError::InvalidAck("empty ack".into()))?;
        debug!("[Client] Message {} acknowledged", seq_id);

        let thread_id = ack_id(&ack, "threadId")?;
        let message_id = ack_id(&ack, "messageId")?;
        self.get_chat_message(thread_id, message_id).await
    }

    /// 获取单条消息
    pub async fn get_chat_message(&self, thread_id: i64, message_id: i64) -> Result<ChatMessage> {
        let response = self
            .transport
            .get(
                &format!("/v1/chat/threads/{}/messages/{}", thread_id, message_id),
                &[],
            )
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    /// 获取最近的消息
    pub async fn get_chat_messages(
        &self,
        thread_id: i64,
        size: u32,
        page_token: Option<&str>,
    ) -> Result<PaginatedList<ChatMessage>> {
        let mut params = vec![("size", size.to_string())];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        let response = self
            .transport
            .get(&format!("/v1/chat/threads/{}/messages", thread_id), &params)
            .await?;
        decode_page(response)
    }

    /// 注册消息处理器
    pub fn register_chat_message_handler<T, X, F, H, Fut>(
        &self,
        handler: H,
        filter: F,
        transform: X,
    ) -> SubscriptionId
    where
        T: 'static,
        X: Fn(&ChatMessage) -> T + Send + Sync + 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.coordinator
            .dispatcher()
            .subscribe(handler, filter, transform)
    }

    /// 注册接收全部消息的处理器
    pub fn on_chat_message<H, Fut>(&self, handler: H) -> SubscriptionId
    where
        H: Fn(ChatMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.coordinator.dispatcher().subscribe_all(handler)
    }

    pub fn unregister_handler(&self, id: SubscriptionId) -> bool {
        self.coordinator.dispatcher().unsubscribe(id)
    }
}

/// ack 中的 ID，整数或数字字符串
fn ack_id(ack: &Value, field: &str) -> Result<i64> {
    match ack.get(field) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ClientLogicError::InvalidAck(format!("missing or invalid {}", field)))
}

fn decode_page(response: Value) -> Result<PaginatedList<ChatMessage>> {
    let items = match response.get("list") {
        Some(list) => serde_json::from_value(list.clone())?,
        None => Vec::new(),
    };
    let next_page_token = response
        .get("pagination")
        .and_then(|pagination| pagination.get("nextPageToken"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(PaginatedList {
        items,
        next_page_token,
    })
}
