//! 长连接帧定义
//!
//! 所有帧都是 JSON 文本，`t` 字段标识帧类型：
//! - 上行：`{"t": <int>, ...payload}`
//! - 下行：`{"t": 1, "msg": {...}}` 或 `{"t": 2, "serverAck": {...}}`

use serde::de::Error as _;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

/// 帧类型字段
pub const TYPE_FIELD: &str = "t";

/// 帧类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsEventType {
    /// 聊天消息
    Message = 1,
    /// 服务端确认
    Ack = 2,
    /// 心跳
    Heartbeat = 8,
    /// 推送（忽略）
    Push = 13,
}

impl WsEventType {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Message),
            2 => Some(Self::Ack),
            8 => Some(Self::Heartbeat),
            13 => Some(Self::Push),
            _ => None,
        }
    }
}

/// 服务端确认
#[derive(Debug, Clone, PartialEq)]
pub struct ServerAck {
    pub seq_id: Option<i64>,
    /// 0 表示成功，-1 表示 apiCode 无法解析
    pub api_code: i64,
    pub api_msg: Option<String>,
    /// 完整的 serverAck 对象
    pub body: Map<String, Value>,
}

impl ServerAck {
    pub fn from_body(body: Map<String, Value>) -> Self {
        let seq_id = body.get("seqId").and_then(|value| match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
        // 缺省视为成功，非整数按无法解析处理
        let api_code = match body.get("apiCode") {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_i64().unwrap_or_else(|| {
                warn!("[Events] Ack carries non-integer apiCode: {}", value);
                -1
            }),
        };
        let api_msg = body
            .get("apiMsg")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            seq_id,
            api_code,
            api_msg,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        self.api_code == 0
    }
}

/// 下行帧
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    /// `msg` 原始 JSON
    Message(Value),
    Ack(ServerAck),
    /// 其他类型（包括推送），只记录类型码
    Unrecognized(i64),
}

#[derive(Deserialize)]
struct RawEnvelope {
    t: i64,
    #[serde(default)]
    msg: Option<Value>,
    #[serde(default, rename = "serverAck")]
    server_ack: Option<Map<String, Value>>,
}

impl InboundEnvelope {
    /// 解析文本帧，缺少 `t` 或不是 JSON 对象时返回错误
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let object = match serde_json::from_str::<Value>(text)? {
            Value::Object(object) => object,
            other => {
                return Err(serde_json::Error::custom(format!(
                    "frame must be a JSON object, got {}",
                    other
                )))
            }
        };
        let raw = RawEnvelope::deserialize(Value::Object(object))?;
        Ok(match (WsEventType::from_code(raw.t), raw.msg, raw.server_ack) {
            (Some(WsEventType::Message), Some(msg), _) => Self::Message(msg),
            (Some(WsEventType::Ack), _, Some(ack)) => Self::Ack(ServerAck::from_body(ack)),
            _ => Self::Unrecognized(raw.t),
        })
    }
}

/// 编码上行帧，`payload` 中的 `t` 会被覆盖
pub fn encode_outbound(
    event_type: i64,
    payload: Map<String, Value>,
) -> Result<String, serde_json::Error> {
    let mut frame = payload;
    frame.insert(TYPE_FIELD.to_string(), Value::from(event_type));
    serde_json::to_string(&frame)
}

/// 心跳帧 `{"t": 8}`
pub fn heartbeat_frame() -> Result<String, serde_json::Error> {
    encode_outbound(WsEventType::Heartbeat.code(), Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_message() {
        let envelope = InboundEnvelope::parse(r#"{"t":1,"msg":{"content":"hi"}}"#).unwrap();
        assert_eq!(envelope, InboundEnvelope::Message(json!({"content": "hi"})));
    }

    #[test]
    fn test_parse_ack() {
        let envelope =
            InboundEnvelope::parse(r#"{"t":2,"serverAck":{"seqId":42,"apiCode":0,"threadId":7}}"#)
                .unwrap();
        let InboundEnvelope::Ack(ack) = envelope else {
            panic!("expected ack");
        };
        assert_eq!(ack.seq_id, Some(42));
        assert!(ack.is_success());
        assert_eq!(ack.body["threadId"], 7);
    }

    #[test]
    fn test_parse_error_ack() {
        let envelope = InboundEnvelope::parse(
            r#"{"t":2,"serverAck":{"seqId":"43","apiCode":2009,"apiMsg":"bad"}}"#,
        )
        .unwrap();
        let InboundEnvelope::Ack(ack) = envelope else {
            panic!("expected ack");
        };
        assert_eq!(ack.seq_id, Some(43));
        assert_eq!(ack.api_code, 2009);
        assert_eq!(ack.api_msg.as_deref(), Some("bad"));
    }

    #[test]
    fn test_parse_unrecognized() {
        assert_eq!(
            InboundEnvelope::parse(r#"{"t":13,"push":{}}"#).unwrap(),
            InboundEnvelope::Unrecognized(13)
        );
        assert_eq!(
            InboundEnvelope::parse(r#"{"t":2}"#).unwrap(),
            InboundEnvelope::Unrecognized(2)
        );
        assert!(InboundEnvelope::parse("not json").is_err());
        assert!(InboundEnvelope::parse(r#"{"msg":{}}"#).is_err());
        assert!(InboundEnvelope::parse("[1,2]").is_err());
        assert!(InboundEnvelope::parse(r#"[2, null, {"seqId":42,"apiCode":0}]"#).is_err());
        assert!(InboundEnvelope::parse("null").is_err());
    }

    #[test]
    fn test_ack_api_code_must_be_integer() {
        let ack = ServerAck::from_body(json!({"seqId": 1}).as_object().cloned().unwrap());
        assert_eq!(ack.api_code, 0);
        assert!(ack.is_success());

        let ack = ServerAck::from_body(
            json!({"seqId": 1, "apiCode": "0"}).as_object().cloned().unwrap(),
        );
        assert_eq!(ack.api_code, -1);
        assert!(!ack.is_success());

        let ack = ServerAck::from_body(
            json!({"seqId": 1, "apiCode": 1.5}).as_object().cloned().unwrap(),
        );
        assert!(!ack.is_success());
    }

    #[test]
    fn test_encode_outbound() {
        let payload = json!({"threadId": 7, "msg": {"content": "x"}, "t": 99});
        let text = encode_outbound(1, payload.as_object().cloned().unwrap()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"t": 1, "threadId": 7, "msg": {"content": "x"}}));

        assert_eq!(heartbeat_frame().unwrap(), r#"{"t":8}"#);
    }
}
