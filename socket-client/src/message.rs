//! 推送消息结构
//!
//! 服务端推送的聊天消息。字段全部可选，未知字段忽略。

use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 聊天消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "lenient_time")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub thread_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub message_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub uid: Option<i64>,
    #[serde(default, rename = "type")]
    pub message_type: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub seq_id: Option<i64>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<Value>,
    #[serde(default)]
    pub media: Option<Value>,
    #[serde(default)]
    pub poll: Option<Value>,
    #[serde(default)]
    pub dice: Option<Value>,
    #[serde(default)]
    pub rich_format: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub extensions: Map<String, Value>,
}

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMessageType {
    Text = 1,
    Media = 2,
    Audio = 6,
    Sticker = 7,
    Dice = 44,
    Poll = 45,
}

impl ChatMessageType {
    pub fn code(self) -> i64 {
        self as i64
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

/// 整数秒、整数毫秒或 RFC 3339 字符串
fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawTime> = Option::deserialize(deserializer)?;
    Ok(match raw {
        None => None,
        Some(RawTime::Int(value)) => from_epoch(value),
        Some(RawTime::Float(value)) => from_epoch(value as i64),
        Some(RawTime::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|time| time.with_timezone(&Utc)),
    })
}

/// 超过 10^11 的值按毫秒处理
fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= 100_000_000_000 {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

/// `null` 视为空对象
fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// 整数或数字字符串
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawId> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(RawId::Int(value)) => Ok(Some(value)),
        Some(RawId::Text(text)) => text
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid id: {}", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_message() {
        let msg: ChatMessage = serde_json::from_value(json!({"content": "hi", "uid": 5})).unwrap();
        assert_eq!(msg.content.as_deref(), Some("hi"));
        assert_eq!(msg.uid, Some(5));
        assert_eq!(msg.thread_id, None);
        assert!(msg.extensions.is_empty());
    }

    #[test]
    fn test_null_extensions() {
        let msg: ChatMessage =
            serde_json::from_value(json!({"content": "hi", "extensions": null})).unwrap();
        assert_eq!(msg.content.as_deref(), Some("hi"));
        assert!(msg.extensions.is_empty());
    }

    #[test]
    fn test_full_message() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "createdTime": 1_700_000_000,
            "threadId": "77",
            "messageId": 9,
            "uid": 5,
            "type": 1,
            "seqId": 123,
            "content": "hello",
            "author": {"nickname": "z"},
            "extensions": {"replyMessage": 3},
            "somethingNew": true
        }))
        .unwrap();

        assert_eq!(msg.thread_id, Some(77));
        assert_eq!(msg.message_type, Some(ChatMessageType::Text.code()));
        assert_eq!(msg.created_time.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(msg.extensions["replyMessage"], 3);
        assert_eq!(msg.author.unwrap()["nickname"], "z");
    }

    #[test]
    fn test_time_formats() {
        let millis: ChatMessage =
            serde_json::from_value(json!({"createdTime": 1_700_000_000_123i64})).unwrap();
        assert_eq!(millis.created_time.unwrap().timestamp_millis(), 1_700_000_000_123);

        let text: ChatMessage =
            serde_json::from_value(json!({"createdTime": "2023-11-14T22:13:20Z"})).unwrap();
        assert_eq!(text.created_time.unwrap().timestamp(), 1_700_000_000);

        let garbage: ChatMessage =
            serde_json::from_value(json!({"createdTime": "yesterday"})).unwrap();
        assert_eq!(garbage.created_time, None);
    }

    #[test]
    fn test_invalid_id_rejected() {
        assert!(serde_json::from_value::<ChatMessage>(json!({"threadId": "abc"})).is_err());
        assert!(serde_json::from_value::<ChatMessage>(json!("not an object")).is_err());
    }
}
