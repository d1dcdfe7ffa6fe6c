//! 事件分发器
//!
//! 每个订阅由 transform、filter、handler 组成。广播时先对订阅列表取快照，
//! 再逐个执行 transform 和 filter，通过的 handler 以独立任务运行。
//!
//! handler 中的 panic 只影响它自己的任务；transform 和 filter 在广播方
//! 同步执行，其中的 panic 不会被捕获。

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

/// 订阅 ID
pub type SubscriptionId = Uuid;

type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type ErasedHandler<C> = Arc<dyn Fn(&C) -> Option<HandlerFuture> + Send + Sync>;

struct Subscription<C> {
    id: SubscriptionId,
    handler: ErasedHandler<C>,
}

/// 事件分发器
pub struct EventDispatcher<C> {
    subscriptions: RwLock<Vec<Subscription<C>>>,
}

impl<C: Send + Sync + 'static> EventDispatcher<C> {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// 注册订阅
    pub fn subscribe<T, X, F, H, Fut>(&self, handler: H, filter: F, transform: X) -> SubscriptionId
    where
        T: 'static,
        X: Fn(&C) -> T + Send + Sync + 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let erased: ErasedHandler<C> = Arc::new(move |content: &C| {
            let value = transform(content);
            if !filter(&value) {
                return None;
            }
            Some(Box::pin(handler(value)) as HandlerFuture)
        });

        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription {
                id,
                handler: erased,
            });
        debug!("[Dispatcher] Subscribed {}", id);
        id
    }

    /// 注册接收全部事件的订阅
    pub fn subscribe_all<H, Fut>(&self, handler: H) -> SubscriptionId
    where
        C: Clone,
        H: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe(handler, |_: &C| true, |content: &C| content.clone())
    }

    /// 取消订阅，ID 不存在时返回 false
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        let removed = subscriptions.len() != before;
        if removed {
            debug!("[Dispatcher] Unsubscribed {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 广播事件，返回启动的 handler 数量
    ///
    /// 必须在 tokio 运行时中调用。
    pub fn broadcast(&self, content: &C) -> usize {
        let snapshot: Vec<ErasedHandler<C>> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|subscription| subscription.handler.clone())
            .collect();

        let mut spawned = 0;
        for handler in snapshot {
            if let Some(future) = handler(content) {
                tokio::spawn(future);
                spawned += 1;
            }
        }
        spawned
    }
}

impl<C: Send + Sync + 'static> Default for EventDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}
