//! 签名错误定义

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Configuration error: {0}")]
    Configuration(String),
}
