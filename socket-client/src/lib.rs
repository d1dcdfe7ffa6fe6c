//! 长连接客户端模块
//!
//! 封装 tokio-tungstenite 提供与 Project Z 聊天服务的双向通信能力：
//! - 签名握手与心跳
//! - 基于 seqId 的请求/ack 关联
//! - 聊天消息推送分发

mod dispatcher;
mod error;
mod events;
mod message;
mod pending;
mod router;
mod session;

pub use dispatcher::{EventDispatcher, SubscriptionId};
pub use error::SocketError;
pub use events::{
    encode_outbound, heartbeat_frame, InboundEnvelope, ServerAck, WsEventType, TYPE_FIELD,
};
pub use message::{ChatMessage, ChatMessageType};
pub use pending::{AckResult, PendingRequests};
pub use router::{InboundRouter, RouteOutcome};
pub use session::{ConnectionState, DuplexSession, SocketConfig, TlsConfig};
