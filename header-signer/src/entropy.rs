//! 时钟和随机源
//!
//! 由调用方提供，测试中可替换为固定实现

use rand::Rng;
use std::net::Ipv4Addr;

/// 墙上时钟
pub trait Clock: Send + Sync {
    /// 当前时间（毫秒时间戳）
    fn now_millis(&self) -> i64;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// 随机源
pub trait Entropy: Send + Sync {
    /// 每个请求的 nonce
    fn nonce(&self) -> String;

    /// 安装 ID（设备 ID 的种子）
    fn installation_id(&self) -> String;

    /// 伪造的 X-Forwarded-For 地址
    fn forwarded_for(&self) -> Ipv4Addr;

    /// 长连接请求的序列号
    fn seq_id(&self) -> i64;
}

/// 系统随机源
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn nonce(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn installation_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn forwarded_for(&self) -> Ipv4Addr {
        Ipv4Addr::from(rand::thread_rng().gen_range(1..=u32::MAX))
    }

    fn seq_id(&self) -> i64 {
        rand::thread_rng().gen_range(0..=i64::MAX)
    }
}
