//! 登录状态协调
//!
//! 把 sId、身份快照和长连接会话绑定在一起：登录时建立连接，登出时断开。

use crate::error::ClientLogicError;
use crate::models::{Account, AuthResult, UserProfile};
use api_client::RequestTransport;
use header_signer::SessionState;
use socket_client::{ChatMessage, DuplexSession, EventDispatcher, SocketConfig};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// 当前登录身份
#[derive(Debug, Clone, Default)]
struct Identity {
    account: Option<Account>,
    user_profile: Option<UserProfile>,
}

/// 登录状态协调器
///
/// 同一时刻最多一个已连接的会话。分发器在多次登录间共享，订阅不会因重新登录丢失。
pub struct SessionAuthCoordinator {
    transport: Arc<RequestTransport>,
    dispatcher: Arc<EventDispatcher<ChatMessage>>,
    socket_config: SocketConfig,
    /// 登录、登出互斥
    session: Mutex<Option<Arc<DuplexSession>>>,
    identity: RwLock<Option<Identity>>,
}

impl SessionAuthCoordinator {
    pub fn new(transport: Arc<RequestTransport>, socket_config: SocketConfig) -> Self {
        Self {
            transport,
            dispatcher: Arc::new(EventDispatcher::new()),
            socket_config,
            session: Mutex::new(None),
            identity: RwLock::new(None),
        }
    }

    pub fn transport(&self) -> &Arc<RequestTransport> {
        &self.transport
    }

    pub fn state(&self) -> &Arc<SessionState> {
        self.transport.session()
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher<ChatMessage>> {
        &self.dispatcher
    }

    /// 当前会话
    pub async fn current_session(&self) -> Option<Arc<DuplexSession>> {
        self.session.lock().await.clone()
    }

    pub fn account(&self) -> Option<Account> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|identity| identity.account.clone())
    }

    pub fn user_profile(&self) -> Option<UserProfile> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|identity| identity.user_profile.clone())
    }

    /// 登录成功后调用
    ///
    /// 已登录时先执行本地登出。连接失败时 sId 和身份保留，可通过 [`Self::reconnect`] 重试。
    pub async fn on_authenticated(&self, auth: &AuthResult) -> Result<(), ClientLogicError> {
        let mut slot = self.session.lock().await;

        if self.state().is_authenticated() {
            info!("[Coordinator] Already logged in, logging out first");
            self.logout_locked(&mut slot).await;
        }

        self.state().set_sid(auth.sid.as_str());
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(Identity {
            account: auth.account.clone(),
            user_profile: auth.user_profile.clone(),
        });
        info!(
            "[Coordinator] Logged in as {:?}",
            auth.user_profile.as_ref().and_then(|profile| profile.uid)
        );

        *slot = Some(self.open_session().await?);
        Ok(())
    }

    /// 本地登出：清除 sId、断开会话、清除身份
    pub async fn on_logout(&self) {
        let mut slot = self.session.lock().await;
        self.logout_locked(&mut slot).await;
    }

    /// 为当前登录身份重建会话
    pub async fn reconnect(&self) -> Result<Arc<DuplexSession>, ClientLogicError> {
        let mut slot = self.session.lock().await;
        if !self.state().is_authenticated() {
            return Err(ClientLogicError::NotAuthenticated);
        }
        if let Some(previous) = slot.take() {
            previous.disconnect().await;
        }
        let session = self.open_session().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    async fn open_session(&self) -> Result<Arc<DuplexSession>, ClientLogicError> {
        let session = Arc::new(DuplexSession::new(
            self.transport.clone(),
            self.dispatcher.clone(),
            self.socket_config.clone(),
        ));
        if let Err(e) = session.connect().await {
            warn!("[Coordinator] Failed to open session: {}", e);
            return Err(e.into());
        }
        Ok(session)
    }

    async fn logout_locked(&self, slot: &mut Option<Arc<DuplexSession>>) {
        self.state().clear_sid();
        if let Some(session) = slot.take() {
            session.disconnect().await;
        }
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = None;
        info!("[Coordinator] Logged out");
    }
}
