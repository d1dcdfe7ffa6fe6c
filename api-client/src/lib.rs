//! API 客户端模块
//!
//! 封装 reqwest 提供带签名的 Project Z HTTP 调用能力

mod body;
mod config;
mod error;
mod transport;

pub use body::{MultipartForm, RequestBody};
pub use config::ApiConfig;
pub use error::{ApiError, ApiErrorKind, ClientError};
pub use transport::{build_path, decode_response, RequestTransport};

pub use reqwest::Method;
