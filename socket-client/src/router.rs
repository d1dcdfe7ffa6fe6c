//! 下行帧路由

use crate::dispatcher::EventDispatcher;
use crate::error::SocketError;
use crate::events::{InboundEnvelope, ServerAck};
use crate::message::ChatMessage;
use crate::pending::PendingRequests;
use api_client::ApiError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// 路由结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// 消息已广播，携带启动的 handler 数量
    Broadcast(usize),
    /// ack 已处理，`matched` 表示是否有请求在等待
    Acked { seq_id: i64, matched: bool },
    /// 无法识别或解析失败
    Dropped,
}

/// 下行帧路由：消息交给分发器，ack 交给等待表
#[derive(Clone)]
pub struct InboundRouter {
    pending: Arc<PendingRequests>,
    dispatcher: Arc<EventDispatcher<ChatMessage>>,
}

impl InboundRouter {
    pub fn new(
        pending: Arc<PendingRequests>,
        dispatcher: Arc<EventDispatcher<ChatMessage>>,
    ) -> Self {
        Self {
            pending,
            dispatcher,
        }
    }

    /// 处理一个文本帧，任何输入都不会 panic
    pub async fn route(&self, text: &str) -> RouteOutcome {
        let envelope = match InboundEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("[Router] Unparseable frame: {}", e);
                return RouteOutcome::Dropped;
            }
        };

        match envelope {
            InboundEnvelope::Message(raw) => self.route_message(raw),
            InboundEnvelope::Ack(ack) => self.route_ack(ack).await,
            InboundEnvelope::Unrecognized(event_type) => {
                debug!("[Router] Ignoring frame type {}", event_type);
                RouteOutcome::Dropped
            }
        }
    }

    fn route_message(&self, raw: Value) -> RouteOutcome {
        match serde_json::from_value::<ChatMessage>(raw) {
            Ok(message) => RouteOutcome::Broadcast(self.dispatcher.broadcast(&message)),
            Err(e) => {
                warn!("[Router] Failed to decode chat message: {}", e);
                RouteOutcome::Dropped
            }
        }
    }

    async fn route_ack(&self, ack: ServerAck) -> RouteOutcome {
        let Some(seq_id) = ack.seq_id else {
            debug!("[Router] Ack without seqId");
            return RouteOutcome::Dropped;
        };

        let result = if ack.is_success() {
            Ok(Value::Object(ack.body))
        } else {
            Err(SocketError::Api(ApiError::from_response(&ack.body)))
        };
        let matched = self.pending.resolve(seq_id, result).await;
        RouteOutcome::Acked { seq_id, matched }
    }
}
