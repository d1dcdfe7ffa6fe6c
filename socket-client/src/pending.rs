//! 等待 ack 的请求表

use crate::error::SocketError;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, warn};

/// ack 结果：成功时为完整的 serverAck 对象
pub type AckResult = Result<Value, SocketError>;

/// 按 seqId 索引的等待表
#[derive(Default)]
pub struct PendingRequests {
    slots: RwLock<HashMap<i64, oneshot::Sender<AckResult>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记等待槽，必须在发送前调用
    ///
    /// seqId 仍在等待时会替换旧槽，旧的调用方收到 [`SocketError::ConnectionClosed`]。
    pub async fn register(&self, seq_id: i64) -> oneshot::Receiver<AckResult> {
        let (tx, rx) = oneshot::channel();
        if let Some(previous) = self.slots.write().await.insert(seq_id, tx) {
            warn!("[Pending] seqId {} reused while still pending", seq_id);
            let _ = previous.send(Err(SocketError::ConnectionClosed));
        }
        rx
    }

    /// 完成等待槽，seqId 未登记时返回 false
    pub async fn resolve(&self, seq_id: i64, result: AckResult) -> bool {
        let Some(tx) = self.slots.write().await.remove(&seq_id) else {
            debug!("[Pending] No request waiting for seqId {}", seq_id);
            return false;
        };
        // 调用方可能已超时放弃
        let _ = tx.send(result);
        true
    }

    /// 移除等待槽（超时或发送失败）
    pub async fn remove(&self, seq_id: i64) -> bool {
        self.slots.write().await.remove(&seq_id).is_some()
    }

    /// 连接关闭时让所有等待中的请求失败，返回失败的数量
    pub async fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.slots.write().await.drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(SocketError::ConnectionClosed));
        }
        if count > 0 {
            debug!("[Pending] Failed {} pending requests", count);
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
