//! 请求签名实现

use crate::error::SignerError;
use crate::profile::SigningProfile;
use crate::session::SessionState;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::collections::HashMap;
use tracing::debug;

/// 请求头集合
pub type Headers = HashMap<String, String>;

/// 参与签名的请求头，顺序固定，由客户端和服务端共同约定
pub const SIGNABLE_HEADERS: [&str; 14] = [
    "rawDeviceId",
    "rawDeviceIdTwo",
    "rawDeviceIdThree",
    "appType",
    "appVersion",
    "osType",
    "deviceType",
    "sId",
    "countryCode",
    "reqTime",
    "User-Agent",
    "contentRegion",
    "nonce",
    "carrierCountryCodes",
];

/// 签名所在的请求头
pub const SIGNATURE_HEADER: &str = "HJTRFS";

pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

type HmacSha256 = Hmac<Sha256>;

/// 请求签名器
#[derive(Debug, Clone, Default)]
pub struct HeaderSigner {
    profile: SigningProfile,
}

impl HeaderSigner {
    pub fn new(profile: SigningProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &SigningProfile {
        &self.profile
    }

    /// 持久化请求头
    pub fn persistent_headers(&self) -> Headers {
        self.profile.persistent_headers()
    }

    /// 每次请求的信息头
    ///
    /// 只有在已登录时才包含 `sId`。
    pub fn request_info_headers(
        &self,
        device_id: &str,
        nonce: &str,
        session: &SessionState,
        now_millis: i64,
    ) -> Headers {
        let locale = session.locale();
        let mut headers = Headers::new();
        headers.insert("rawDeviceId".to_string(), device_id.to_string());
        headers.insert("nonce".to_string(), nonce.to_string());
        headers.insert("Accept-Language".to_string(), locale.language.clone());
        headers.insert(
            "countryCode".to_string(),
            locale.country_code.to_uppercase(),
        );
        headers.insert(
            "carrierCountryCodes".to_string(),
            locale.country_code.clone(),
        );
        headers.insert("timeZone".to_string(), locale.time_zone.to_string());
        headers.insert("reqTime".to_string(), now_millis.to_string());
        if let Some(sid) = session.sid() {
            headers.insert("sId".to_string(), sid);
        }
        headers
    }

    /// 计算请求签名
    ///
    /// 消息依次为：`path`、按 [`SIGNABLE_HEADERS`] 顺序出现在 `headers` 中的值
    /// （缺失的直接跳过）、非空的 `body`。结果为 `base64(version ‖ HMAC-SHA256)`。
    pub fn build_signature(
        &self,
        path: &str,
        headers: &Headers,
        body: &[u8],
    ) -> Result<String, SignerError> {
        let mut mac = HmacSha256::new_from_slice(&self.profile.signature_key)
            .map_err(|e| SignerError::Configuration(format!("Invalid signature key: {}", e)))?;

        mac.update(path.as_bytes());
        for name in SIGNABLE_HEADERS {
            if let Some(value) = headers.get(name) {
                mac.update(value.as_bytes());
            }
        }
        if !body.is_empty() {
            mac.update(body);
        }

        let digest = mac.finalize().into_bytes();
        let mut signed = Vec::with_capacity(1 + digest.len());
        signed.push(self.profile.version);
        signed.extend_from_slice(&digest);

        debug!("[HeaderSigner] Signed {} ({} body bytes)", path, body.len());
        Ok(BASE64.encode(signed))
    }

    /// 由安装 ID 派生设备 ID
    ///
    /// `prefix = version ‖ SHA1(installation_id)`，
    /// 结果为 `hex(prefix ‖ SHA1(prefix ‖ SHA1(secret)))`。
    pub fn generate_device_id(&self, installation_id: &str) -> Result<String, SignerError> {
        if installation_id.is_empty() {
            return Err(SignerError::Configuration(
                "Installation id cannot be empty".to_string(),
            ));
        }

        let mut prefix = Vec::with_capacity(21);
        prefix.push(self.profile.version);
        prefix.extend_from_slice(&Sha1::digest(installation_id.as_bytes()));

        let secret_digest = Sha1::digest(&self.profile.device_id_secret);
        let mut hasher = Sha1::new();
        hasher.update(&prefix);
        hasher.update(secret_digest);
        let suffix = hasher.finalize();

        let mut id = prefix;
        id.extend_from_slice(&suffix);
        Ok(hex::encode(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SIGNATURE_VERSION;
    use crate::session::LocaleConfig;

    fn signer() -> HeaderSigner {
        HeaderSigner::new(SigningProfile::android())
    }

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn session() -> SessionState {
        SessionState::new(LocaleConfig {
            language: "en-US".to_string(),
            country_code: "us".to_string(),
            time_zone: 180,
        })
    }

    #[test]
    fn test_signature_known_vectors() {
        let signer = signer();
        assert_eq!(
            signer
                .build_signature("/v1/users/me", &Headers::new(), b"")
                .unwrap(),
            "BDWhAs1wAynte1P2H8eqAWoeIBqbwFyqS387HVZUAnOe"
        );

        let h = headers(&[
            ("nonce", "n-1"),
            ("appType", "MainApp"),
            ("reqTime", "1700000000000"),
        ]);
        assert_eq!(
            signer
                .build_signature("/v1/auth/login", &h, br#"{"a":1}"#)
                .unwrap(),
            "BFYN2Q8nSaKnrkrRKW4UiHCii+DLRBdclkj6oUHfttma"
        );
    }

    #[test]
    fn test_signature_deterministic() {
        let signer = signer();
        let h = headers(&[("nonce", "abc"), ("sId", "s")]);
        let a = signer.build_signature("/p", &h, b"body").unwrap();
        let b = signer.build_signature("/p", &h, b"body").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_changes_with_signable_header_or_body() {
        let signer = signer();
        let base = headers(&[("nonce", "abc"), ("reqTime", "1")]);
        let baseline = signer.build_signature("/p", &base, b"body").unwrap();

        let changed = headers(&[("nonce", "abd"), ("reqTime", "1")]);
        assert_ne!(
            signer.build_signature("/p", &changed, b"body").unwrap(),
            baseline
        );
        assert_ne!(
            signer.build_signature("/p", &base, b"other").unwrap(),
            baseline
        );
        assert_ne!(
            signer.build_signature("/q", &base, b"body").unwrap(),
            baseline
        );
    }

    #[test]
    fn test_signature_ignores_unsignable_headers() {
        let signer = signer();
        let base = headers(&[("nonce", "abc")]);
        let mut extended = base.clone();
        extended.insert("Content-Type".to_string(), "application/json".to_string());
        extended.insert(FORWARDED_FOR_HEADER.to_string(), "1.2.3.4".to_string());
        extended.insert("timeZone".to_string(), "180".to_string());

        assert_eq!(
            signer.build_signature("/p", &base, b"").unwrap(),
            signer.build_signature("/p", &extended, b"").unwrap()
        );
    }

    #[test]
    fn test_signature_uses_fixed_order() {
        let signer = signer();
        // 值互换后顺序不同，签名应不同
        let a = headers(&[("appType", "x"), ("nonce", "y")]);
        let b = headers(&[("appType", "y"), ("nonce", "x")]);
        assert_ne!(
            signer.build_signature("/p", &a, b"").unwrap(),
            signer.build_signature("/p", &b, b"").unwrap()
        );
    }

    #[test]
    fn test_signature_prefix_is_version() {
        let raw = BASE64
            .decode(signer().build_signature("/p", &Headers::new(), b"").unwrap())
            .unwrap();
        assert_eq!(raw.len(), 33);
        assert_eq!(raw[0], SIGNATURE_VERSION);
    }

    #[test]
    fn test_device_id_known_vector() {
        assert_eq!(
            signer().generate_device_id("installation-1").unwrap(),
            "04a08220f85d3586684b772ebaf3ec2a3cd054cc1f28af2d0912dc3070ad6f68a8314e39ddc7461c86"
        );
    }

    #[test]
    fn test_device_id_deterministic_and_distinct() {
        let signer = signer();
        let a = signer.generate_device_id("install-a").unwrap();
        assert_eq!(a, signer.generate_device_id("install-a").unwrap());
        assert_ne!(a, signer.generate_device_id("install-b").unwrap());
        assert_eq!(a.len(), 82);
        assert!(a.starts_with("04"));
    }

    #[test]
    fn test_device_id_rejects_empty() {
        assert!(matches!(
            signer().generate_device_id(""),
            Err(SignerError::Configuration(_))
        ));
    }

    #[test]
    fn test_request_info_headers() {
        let signer = signer();
        let session = session();

        let h = signer.request_info_headers("dev", "nonce-1", &session, 42);
        assert_eq!(h["rawDeviceId"], "dev");
        assert_eq!(h["nonce"], "nonce-1");
        assert_eq!(h["Accept-Language"], "en-US");
        assert_eq!(h["countryCode"], "US");
        assert_eq!(h["carrierCountryCodes"], "us");
        assert_eq!(h["timeZone"], "180");
        assert_eq!(h["reqTime"], "42");
        assert!(!h.contains_key("sId"));

        session.set_sid("sid-9");
        let h = signer.request_info_headers("dev", "nonce-1", &session, 42);
        assert_eq!(h["sId"], "sid-9");
    }
}
