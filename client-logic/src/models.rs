//! 登录和消息相关的数据结构

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 登录方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Email = 1,
    PhoneNumber = 2,
}

/// 登录请求
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub auth_type: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub password: String,
}

impl LoginRequest {
    pub fn email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Email as i64,
            email: Some(email.into()),
            phone_number: None,
            password: password.into(),
        }
    }

    pub fn phone_number(phone_number: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::PhoneNumber as i64,
            email: None,
            phone_number: Some(phone_number.into()),
            password: password.into(),
        }
    }
}

/// 账号信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub uid: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    /// 其余字段原样保留
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 用户资料
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub uid: Option<i64>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 登录响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    #[serde(default)]
    pub secret: String,
    #[serde(rename = "sId")]
    pub sid: String,
    #[serde(default)]
    pub account: Option<Account>,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
}

/// 待发送的聊天消息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDraft {
    pub message_type: i64,
    pub content: Option<String>,
    /// 回复的消息 ID
    pub reply_to: Option<i64>,
    pub rich_format: Option<Value>,
    /// 图片或语音
    pub media: Option<Value>,
    pub poll_id: Option<i64>,
    pub dice_id: Option<i64>,
}

impl MessageDraft {
    /// 文本消息
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message_type: 1,
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_type(message_type: i64) -> Self {
        Self {
            message_type,
            ..Self::default()
        }
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn rich_format(mut self, rich_format: Value) -> Self {
        self.rich_format = Some(rich_format);
        self
    }

    pub fn media(mut self, media: Value) -> Self {
        self.media = Some(media);
        self
    }

    pub fn poll(mut self, poll_id: i64) -> Self {
        self.poll_id = Some(poll_id);
        self
    }

    pub fn dice(mut self, dice_id: i64) -> Self {
        self.dice_id = Some(dice_id);
        self
    }

    /// 生成 `msg` 对象
    pub fn to_message(&self, thread_id: i64, uid: Option<i64>, seq_id: i64) -> Map<String, Value> {
        let mut extensions = Map::new();
        if let Some(reply_to) = self.reply_to {
            extensions.insert("replyMessage".into(), reply_to.into());
        }
        if let Some(poll_id) = self.poll_id {
            extensions.insert("pollId".into(), poll_id.into());
        }
        if let Some(dice_id) = self.dice_id {
            extensions.insert("diceId".into(), dice_id.into());
        }

        let mut msg = Map::new();
        msg.insert("type".into(), self.message_type.into());
        msg.insert("threadId".into(), thread_id.into());
        if let Some(uid) = uid {
            msg.insert("uid".into(), uid.into());
        }
        msg.insert("seqId".into(), seq_id.into());
        msg.insert("extensions".into(), Value::Object(extensions));
        if let Some(content) = &self.content {
            msg.insert("content".into(), content.clone().into());
        }
        if let Some(rich_format) = &self.rich_format {
            msg.insert("richFormat".into(), rich_format.clone());
        }
        if let Some(media) = &self.media {
            msg.insert("media".into(), media.clone());
        }
        msg
    }
}

/// 分页结果
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedList<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}
