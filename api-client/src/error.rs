//! API 错误定义
//!
//! 服务端错误码到错误类型的静态映射，HTTP 和长连接 ack 共用

use header_signer::SignerError;
use serde_json::{Map, Value};
use thiserror::Error;

/// 错误码字段
pub const API_CODE_FIELD: &str = "apiCode";
/// 错误信息字段
pub const API_MSG_FIELD: &str = "apiMsg";

/// 已知的服务端错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// -1：响应无法解析
    BadResponse,
    /// 2009：邮箱无效
    InvalidEmail,
    /// 1008：触发验证码
    CaptchaCaught { redirect_url: Option<String> },
    /// 未登记的错误码
    Unknown,
}

impl ApiErrorKind {
    /// 按错误码查找错误类型，附加字段从响应中提取
    pub fn from_code(code: i64, response: &Map<String, Value>) -> Self {
        match code {
            -1 => Self::BadResponse,
            2009 => Self::InvalidEmail,
            1008 => Self::CaptchaCaught {
                redirect_url: response
                    .get("redirectUrl")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            _ => Self::Unknown,
        }
    }
}

/// 服务端返回的业务错误
#[derive(Error, Debug, Clone, PartialEq)]
#[error("API error {code}: {message}")]
pub struct ApiError {
    pub code: i64,
    pub message: String,
    pub kind: ApiErrorKind,
    /// 除 apiCode / apiMsg 以外的字段
    pub extras: Map<String, Value>,
}

impl ApiError {
    /// 从包含错误码的响应（或 ack）构建
    ///
    /// 缺失、非整数或为 0 的错误码都记为 -1。
    pub fn from_response(response: &Map<String, Value>) -> Self {
        let code = response
            .get(API_CODE_FIELD)
            .and_then(Value::as_i64)
            .filter(|code| *code != 0)
            .unwrap_or(-1);
        let message = response
            .get(API_MSG_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let extras = response
            .iter()
            .filter(|(key, _)| key.as_str() != API_CODE_FIELD && key.as_str() != API_MSG_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            code,
            message,
            kind: ApiErrorKind::from_code(code, response),
            extras,
        }
    }
}

/// HTTP 调用错误
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl From<SignerError> for ClientError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Configuration(msg) => Self::Configuration(msg),
        }
    }
}
