//! 业务层错误定义

use api_client::ClientError;
use socket_client::SocketError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientLogicError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Invalid ack: {0}")]
    InvalidAck(String),
}
