//! 签名配置
//!
//! 签名密钥和应用身份常量在编译期内置，通过配置按平台选择

use crate::error::SignerError;
use crate::signer::Headers;

/// 签名与设备 ID 的版本标记
pub const SIGNATURE_VERSION: u8 = 0x04;

const ANDROID_SIGNATURE_KEY: [u8; 64] = [
    0xce, 0x07, 0x02, 0x79, 0x27, 0x8d, 0xe1, 0xb6, 0x39, 0x0b, 0x76, 0x94, 0x2c,
    0x13, 0xa0, 0xb0, 0xaa, 0x0f, 0xda, 0x6a, 0xed, 0xd6, 0xf2, 0xd6, 0x55, 0xed,
    0xa7, 0xcf, 0x65, 0x43, 0xb3, 0x5f, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a,
    0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a,
    0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a, 0x6a,
];

const ANDROID_DEVICE_ID_SECRET: [u8; 18] = [
    0x99, 0x7e, 0xc9, 0x28, 0xa8, 0x5f, 0x53, 0x9e, 0x3f, 0xa1, 0x24, 0x76, 0x1e,
    0x75, 0x72, 0xef, 0x85, 0x2e,
];

const ANDROID_APP_VERSION: &str = "2.27.1";

const ANDROID_USER_AGENT: &str = "com.projz.z.android/2.27.1-25104 \
     (Linux; U; Android 7.1.2; ASUS_Z01QD; Build/Asus-user 7.1.2 2017)";

/// 签名配置
///
/// 包含签名密钥、设备 ID 密钥以及随每个请求发送的应用身份常量。
/// 客户端与服务端共享这些值，任何改动都会使签名失效。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningProfile {
    /// 平台名称
    pub platform: String,
    /// 版本标记（签名和设备 ID 的首字节）
    pub version: u8,
    /// HMAC-SHA256 共享密钥
    pub signature_key: Vec<u8>,
    /// 设备 ID 派生密钥
    pub device_id_secret: Vec<u8>,
    pub app_type: String,
    pub app_version: String,
    pub os_type: String,
    pub device_type: String,
    pub flavor: String,
    pub user_agent: String,
}

impl SigningProfile {
    /// Android 客户端配置
    pub fn android() -> Self {
        Self {
            platform: "android".to_string(),
            version: SIGNATURE_VERSION,
            signature_key: ANDROID_SIGNATURE_KEY.to_vec(),
            device_id_secret: ANDROID_DEVICE_ID_SECRET.to_vec(),
            app_type: "MainApp".to_string(),
            app_version: ANDROID_APP_VERSION.to_string(),
            os_type: "2".to_string(),
            device_type: "1".to_string(),
            flavor: "google".to_string(),
            user_agent: ANDROID_USER_AGENT.to_string(),
        }
    }

    /// 按平台名称选择内置配置
    pub fn for_platform(platform: &str) -> Result<Self, SignerError> {
        match platform.to_ascii_lowercase().as_str() {
            "android" => Ok(Self::android()),
            other => Err(SignerError::Configuration(format!(
                "No signing profile for platform: {}",
                other
            ))),
        }
    }

    /// 替换密钥材料（十六进制），其余常量保持不变
    pub fn with_hex_keys(
        mut self,
        signature_key: &str,
        device_id_secret: &str,
    ) -> Result<Self, SignerError> {
        self.signature_key = decode_key("signature key", signature_key)?;
        self.device_id_secret = decode_key("device id secret", device_id_secret)?;
        Ok(self)
    }

    /// 持久化请求头（应用身份）
    pub fn persistent_headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.insert("appType".to_string(), self.app_type.clone());
        headers.insert("appVersion".to_string(), self.app_version.clone());
        headers.insert("osType".to_string(), self.os_type.clone());
        headers.insert("deviceType".to_string(), self.device_type.clone());
        headers.insert("flavor".to_string(), self.flavor.clone());
        headers.insert("User-Agent".to_string(), self.user_agent.clone());
        headers
    }
}

impl Default for SigningProfile {
    fn default() -> Self {
        Self::android()
    }
}

fn decode_key(name: &str, value: &str) -> Result<Vec<u8>, SignerError> {
    let bytes = hex::decode(value.trim())
        .map_err(|e| SignerError::Configuration(format!("Invalid {}: {}", name, e)))?;
    if bytes.is_empty() {
        return Err(SignerError::Configuration(format!("Empty {}", name)));
    }
    Ok(bytes)
}
