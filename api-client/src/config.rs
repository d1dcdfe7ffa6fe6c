//! API 客户端配置

use header_signer::{LocaleConfig, SigningProfile};
use std::time::Duration;

/// API 客户端配置
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// 签名接口地址
    pub api_url: String,
    /// Web 接口地址（不签名，路径加 /api/f 前缀）
    pub web_url: String,
    /// 地区配置
    pub locale: LocaleConfig,
    /// 签名配置
    pub profile: SigningProfile,
    /// 是否以 info 级别记录每个请求
    pub log_requests: bool,
    /// 单次 HTTP 请求超时
    pub timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // 从环境变量读取配置，默认官方地址
        Self {
            api_url: std::env::var("PROJZ_API_URL")
                .unwrap_or_else(|_| "https://api.projz.com".to_string()),
            web_url: std::env::var("PROJZ_WEB_URL")
                .unwrap_or_else(|_| "https://www.projz.com".to_string()),
            locale: LocaleConfig::default(),
            profile: SigningProfile::default(),
            log_requests: std::env::var("PROJZ_HTTP_LOGGING")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}
