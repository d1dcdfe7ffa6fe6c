//! HTTP 传输层实现

use crate::body::{MultipartForm, RequestBody, JSON_CONTENT_TYPE};
use crate::config::ApiConfig;
use crate::error::{ApiError, ClientError, API_CODE_FIELD};
use header_signer::{
    Clock, Entropy, HeaderSigner, Headers, OsEntropy, SessionState, SystemClock,
    FORWARDED_FOR_HEADER, SIGNATURE_HEADER,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Web 接口路径前缀
const WEB_PREFIX: &str = "/api/f";

/// 带签名的 HTTP 传输层
pub struct RequestTransport {
    http: reqwest::Client,
    config: ApiConfig,
    signer: HeaderSigner,
    session: Arc<SessionState>,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn Entropy>,
}

impl RequestTransport {
    /// 使用系统时钟和系统随机源创建
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        Self::with_sources(config, Arc::new(SystemClock), Arc::new(OsEntropy))
    }

    /// 使用指定的时钟和随机源创建
    pub fn with_sources(
        config: ApiConfig,
        clock: Arc<dyn Clock>,
        entropy: Arc<dyn Entropy>,
    ) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            signer: HeaderSigner::new(config.profile.clone()),
            session: Arc::new(SessionState::new(config.locale.clone())),
            config,
            clock,
            entropy,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn signer(&self) -> &HeaderSigner {
        &self.signer
    }

    /// 会话状态（sId、设备 ID）
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn entropy(&self) -> &Arc<dyn Entropy> {
        &self.entropy
    }

    /// 设备 ID，首次使用时由随机安装 ID 生成
    pub fn device_id(&self) -> Result<String, ClientError> {
        let id = self.session.device_id_or_try_init(|| {
            self.signer
                .generate_device_id(&self.entropy.installation_id())
        })?;
        Ok(id.to_string())
    }

    /// 构建签名请求头
    ///
    /// 持久化头 ∪ 请求信息头 ∪ `extra` ∪ X-Forwarded-For，最后在 HJTRFS 写入签名。
    pub fn build_headers(
        &self,
        endpoint: &str,
        body: &[u8],
        extra: &[(&str, &str)],
    ) -> Result<Headers, ClientError> {
        let device_id = self.device_id()?;

        let mut headers = self.signer.persistent_headers();
        headers.extend(self.signer.request_info_headers(
            &device_id,
            &self.entropy.nonce(),
            &self.session,
            self.clock.now_millis(),
        ));
        for (name, value) in extra {
            headers.insert(name.to_string(), value.to_string());
        }
        headers.insert(
            FORWARDED_FOR_HEADER.to_string(),
            self.entropy.forwarded_for().to_string(),
        );

        let signature = self.signer.build_signature(endpoint, &headers, body)?;
        headers.insert(SIGNATURE_HEADER.to_string(), signature);
        Ok(headers)
    }

    /// 发送请求并解析 JSON 响应
    ///
    /// 响应包含 `apiCode` 时返回 [`ClientError::Api`]。
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
        body: Option<Vec<u8>>,
        content_type: Option<&str>,
        web: bool,
    ) -> Result<Value, ClientError> {
        let path = build_path(endpoint, params, web);
        let base_url = if web {
            &self.config.web_url
        } else {
            &self.config.api_url
        };
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);

        match &body {
            Some(bytes) if self.config.log_requests => {
                info!("[HTTP] [{} {}] [{} bytes]", method, path, bytes.len())
            }
            None if self.config.log_requests => info!("[HTTP] [{} {}]", method, path),
            Some(bytes) => debug!("[HTTP] [{} {}] [{} bytes]", method, path, bytes.len()),
            None => debug!("[HTTP] [{} {}]", method, path),
        }

        let mut extra = Vec::new();
        if let Some(content_type) = content_type {
            extra.push(("Content-Type", content_type));
        }

        // Web 接口不签名
        let headers = if web {
            let mut headers = HeaderMap::new();
            if let Some(content_type) = content_type {
                headers.insert(CONTENT_TYPE, header_value(content_type)?);
            }
            headers
        } else {
            let signed = self.build_headers(
                &path,
                body.as_deref().unwrap_or_default(),
                &extra,
            )?;
            to_header_map(&signed)?
        };

        let mut builder = self.http.request(method, url).headers(headers);
        if let Some(bytes) = body {
            builder = builder.body(bytes);
        }

        let response = builder.send().await?;
        let bytes = response.bytes().await?;
        decode_response(&bytes)
    }

    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ClientError> {
        self.request(Method::GET, endpoint, params, None, None, false)
            .await
    }

    pub async fn delete(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ClientError> {
        self.request(Method::DELETE, endpoint, params, None, None, false)
            .await
    }

    /// POST 任意请求体，`content_type` 为空时使用请求体的默认类型
    pub async fn post(
        &self,
        endpoint: &str,
        body: RequestBody,
        content_type: Option<&str>,
    ) -> Result<Value, ClientError> {
        let (bytes, default_type) = body.encode()?;
        let content_type = content_type.map(str::to_string).or(default_type);
        self.request(
            Method::POST,
            endpoint,
            &[],
            Some(bytes),
            content_type.as_deref(),
            false,
        )
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<Value, ClientError> {
        let bytes = serde_json::to_vec(body)?;
        self.request(
            Method::POST,
            endpoint,
            &[],
            Some(bytes),
            Some(JSON_CONTENT_TYPE),
            false,
        )
        .await
    }

    pub async fn post_empty(&self, endpoint: &str) -> Result<Value, ClientError> {
        self.post(endpoint, RequestBody::Empty, None).await
    }

    /// POST multipart 表单，签名覆盖编码后的完整字节
    pub async fn post_multipart(
        &self,
        endpoint: &str,
        form: MultipartForm,
    ) -> Result<Value, ClientError> {
        self.post(endpoint, RequestBody::Multipart(form), None).await
    }
}

/// 拼接请求路径：补全前导 `/`，追加查询参数，Web 接口加前缀
pub fn build_path(endpoint: &str, params: &[(&str, String)], web: bool) -> String {
    let mut path = if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{}", endpoint)
    };

    if !params.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        path.push('?');
        path.push_str(&query);
    }

    if web {
        path = format!("{}{}", WEB_PREFIX, path);
    }
    path
}

/// 解析响应体
pub fn decode_response(bytes: &[u8]) -> Result<Value, ClientError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| {
        ClientError::Decode(format!("Can't read response from Project Z API: {}", e))
    })?;

    if let Some(object) = value.as_object() {
        if object.contains_key(API_CODE_FIELD) {
            return Err(ApiError::from_response(object).into());
        }
    }
    Ok(value)
}

fn header_value(value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(value).map_err(|e| ClientError::InvalidHeader(format!("{}: {}", value, e)))
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap, ClientError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::InvalidHeader(format!("{}: {}", name, e)))?;
        map.insert(name, header_value(value)?);
    }
    Ok(map)
}
