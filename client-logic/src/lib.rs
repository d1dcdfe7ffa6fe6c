//! 客户端业务逻辑层
//!
//! 整合 api-client 和 socket-client，实现登录状态管理和聊天收发

mod client;
mod coordinator;
mod error;
mod models;

pub use client::Client;
pub use coordinator::SessionAuthCoordinator;
pub use error::ClientLogicError;
pub use models::{
    Account, AuthResult, AuthType, LoginRequest, MessageDraft, PaginatedList, UserProfile,
};
