//! Socket 错误定义

use api_client::{ApiError, ClientError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SocketError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Ack timeout")]
    AckTimeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Can't wait for ack without seq id")]
    MissingSeqId,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Client(#[from] ClientError),
}
