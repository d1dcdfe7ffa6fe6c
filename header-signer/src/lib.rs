//! Header Signer - 请求签名层
//!
//! 提供 Project Z API 的请求认证能力：
//! - 持久化应用身份请求头
//! - 每次请求的附加信息头
//! - HMAC 请求签名
//! - 设备 ID 生成

mod entropy;
mod error;
mod profile;
mod session;
mod signer;

pub use entropy::{Clock, Entropy, OsEntropy, SystemClock};
pub use error::SignerError;
pub use profile::{SigningProfile, SIGNATURE_VERSION};
pub use session::{LocaleConfig, SessionState};
pub use signer::{
    HeaderSigner, Headers, FORWARDED_FOR_HEADER, SIGNABLE_HEADERS, SIGNATURE_HEADER,
};
