//! 会话状态
//!
//! 设备 ID、会话 ID（sId）和地区配置。由登录协调器持有，签名和长连接只读。

use std::sync::{OnceLock, PoisonError, RwLock};

/// 地区配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleConfig {
    /// Accept-Language，如 en-US
    pub language: String,
    /// 国家代码，如 us
    pub country_code: String,
    /// 时区偏移（分钟）
    pub time_zone: i32,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        // 从环境变量读取，默认 en-US / us / 180
        Self {
            language: std::env::var("PROJZ_LANGUAGE").unwrap_or_else(|_| "en-US".to_string()),
            country_code: std::env::var("PROJZ_COUNTRY_CODE")
                .unwrap_or_else(|_| "us".to_string()),
            time_zone: std::env::var("PROJZ_TIME_ZONE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(180),
        }
    }
}

/// 会话状态
#[derive(Debug, Default)]
pub struct SessionState {
    locale: LocaleConfig,
    /// 进程生命周期内只生成一次
    device_id: OnceLock<String>,
    sid: RwLock<Option<String>>,
}

impl SessionState {
    pub fn new(locale: LocaleConfig) -> Self {
        Self {
            locale,
            device_id: OnceLock::new(),
            sid: RwLock::new(None),
        }
    }

    pub fn locale(&self) -> &LocaleConfig {
        &self.locale
    }

    /// 已缓存的设备 ID
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.get().map(String::as_str)
    }

    /// 获取设备 ID，首次调用时通过 `init` 生成并缓存
    pub fn device_id_or_try_init<E>(
        &self,
        init: impl FnOnce() -> Result<String, E>,
    ) -> Result<&str, E> {
        if let Some(id) = self.device_id.get() {
            return Ok(id);
        }
        let generated = init()?;
        // 并发初始化时以先写入者为准
        Ok(self.device_id.get_or_init(|| generated).as_str())
    }

    /// 当前会话 ID
    pub fn sid(&self) -> Option<String> {
        self.sid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_sid(&self, sid: impl Into<String>) {
        let sid = sid.into();
        *self.sid.write().unwrap_or_else(PoisonError::into_inner) =
            if sid.is_empty() { None } else { Some(sid) };
    }

    pub fn clear_sid(&self) {
        *self.sid.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.sid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
