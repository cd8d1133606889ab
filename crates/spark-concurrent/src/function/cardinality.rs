//! 订阅基数约束：顺序、并发、不可重订阅三种策略。
//!
//! # 教案级导览
//!
//! - **Why**：测试替身需要模拟真实源的订阅基数语义；两个 `subscribe` 可能在不同线程同时到达，
//!   若用“先读后写”的标记判断，会在重排序下产生两个赢家。
//! - **What**：
//!   - [`SequentialSubscribers`]：`Idle -> Active -> Idle`，终止或取消都会回到 `Idle`；`Active` 时的新订阅被拒绝；
//!   - [`ConcurrentSubscribers`]：不做限制，仅计数；
//!   - [`NonResubscribeable`]：`Unused -> Used`，第二次订阅（即便第一次已终止）被拒绝；
//!   - 被拒绝的订阅者收到 `on_subscribe(IgnoreCancel)` + `on_error(SubscribeError)`，活跃订阅者不受影响。
//! - **How**：基数状态的声明是一次 `compare_exchange`，竞争者中恰好一个成功；
//!   顺序策略为每次订阅发放一个“租约”，终止或取消时只归还一次，迟到的信号不会误释放后续订阅者的槽位。

use std::{fmt, marker::PhantomData, sync::Arc};

//
// 教案级说明：Loom 模型检查需要接管基数状态上的全部原子操作，
// 启用 `--cfg loom` / `--cfg spark_loom` 时切换到 Loom 提供的原子类型。
#[cfg(not(any(loom, spark_loom)))]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
#[cfg(any(loom, spark_loom))]
use loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{
    cancellable::{Cancellable, DynCancellable},
    error::{CardinalityPolicy, ErrorCause, SubscribeError},
    single::{BoxSubscriber, SingleSubscriber},
};

use super::{SubscriberFunction, reject};

struct SequentialState {
    active: AtomicBool,
    accepted: AtomicUsize,
}

/// 顺序订阅策略（默认）。
///
/// 克隆出的句柄共享同一份状态，测试可以保留一个句柄观察当前是否存在活跃订阅者。
pub struct SequentialSubscribers<T> {
    state: Arc<SequentialState>,
    _marker: PhantomData<fn(T)>,
}

impl<T> SequentialSubscribers<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SequentialState {
                active: AtomicBool::new(false),
                accepted: AtomicUsize::new(0),
            }),
            _marker: PhantomData,
        }
    }

    /// 当前是否存在已订阅且尚未终止/取消的订阅者。
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Acquire)
    }

    /// 累计接受的订阅次数。
    pub fn subscription_count(&self) -> usize {
        self.state.accepted.load(Ordering::Acquire)
    }
}

impl<T> Default for SequentialSubscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SequentialSubscribers<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SequentialSubscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialSubscribers")
            .field("active", &self.is_active())
            .field("subscription_count", &self.subscription_count())
            .finish()
    }
}

impl<T> SubscriberFunction<T> for SequentialSubscribers<T>
where
    T: Send + 'static,
{
    fn apply(&self, subscriber: BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError> {
        if self
            .state
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(reject(
                subscriber,
                SubscribeError::AlreadySubscribed {
                    policy: CardinalityPolicy::Sequential,
                },
            ));
        }
        self.state.accepted.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(SequentialSubscriber {
            lease: Arc::new(Lease {
                state: Arc::clone(&self.state),
                released: AtomicBool::new(false),
            }),
            inner: subscriber,
        }))
    }
}

/// 一次被接受的订阅持有的槽位租约。
struct Lease {
    state: Arc<SequentialState>,
    released: AtomicBool,
}

impl Lease {
    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.state.active.store(false, Ordering::Release);
        }
    }
}

struct ReleasingCancellable {
    lease: Arc<Lease>,
    target: DynCancellable,
}

impl Cancellable for ReleasingCancellable {
    fn cancel(&self) {
        self.lease.release();
        self.target.cancel();
    }
}

struct SequentialSubscriber<T> {
    lease: Arc<Lease>,
    inner: BoxSubscriber<T>,
}

impl<T> SingleSubscriber<T> for SequentialSubscriber<T>
where
    T: Send,
{
    fn on_subscribe(&self, cancellable: DynCancellable) {
        self.inner.on_subscribe(Arc::new(ReleasingCancellable {
            lease: Arc::clone(&self.lease),
            target: cancellable,
        }));
    }

    // 先归还槽位再投递：订阅者可以在终止回调里立即重新订阅。
    fn on_success(&self, result: Option<T>) {
        self.lease.release();
        self.inner.on_success(result);
    }

    fn on_error(&self, error: ErrorCause) {
        self.lease.release();
        self.inner.on_error(error);
    }
}

/// 并发订阅策略：不限制订阅者，原样返回订阅者并计数。
pub struct ConcurrentSubscribers<T> {
    accepted: Arc<AtomicUsize>,
    _marker: PhantomData<fn(T)>,
}

impl<T> ConcurrentSubscribers<T> {
    pub fn new() -> Self {
        Self {
            accepted: Arc::new(AtomicUsize::new(0)),
            _marker: PhantomData,
        }
    }

    /// 累计接受的订阅次数。
    pub fn subscription_count(&self) -> usize {
        self.accepted.load(Ordering::Acquire)
    }
}

impl<T> Default for ConcurrentSubscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ConcurrentSubscribers<T> {
    fn clone(&self) -> Self {
        Self {
            accepted: Arc::clone(&self.accepted),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ConcurrentSubscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentSubscribers")
            .field("subscription_count", &self.subscription_count())
            .finish()
    }
}

impl<T> SubscriberFunction<T> for ConcurrentSubscribers<T>
where
    T: Send + 'static,
{
    fn apply(&self, subscriber: BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError> {
        self.accepted.fetch_add(1, Ordering::AcqRel);
        Ok(subscriber)
    }
}

/// 不可重订阅策略：整个生命周期只接受一次订阅。
pub struct NonResubscribeable<T> {
    used: Arc<AtomicBool>,
    _marker: PhantomData<fn(T)>,
}

impl<T> NonResubscribeable<T> {
    pub fn new() -> Self {
        Self {
            used: Arc::new(AtomicBool::new(false)),
            _marker: PhantomData,
        }
    }

    /// 唯一的订阅名额是否已被占用。
    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }
}

impl<T> Default for NonResubscribeable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for NonResubscribeable<T> {
    fn clone(&self) -> Self {
        Self {
            used: Arc::clone(&self.used),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for NonResubscribeable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonResubscribeable")
            .field("used", &self.is_used())
            .finish()
    }
}

impl<T> SubscriberFunction<T> for NonResubscribeable<T>
where
    T: Send + 'static,
{
    fn apply(&self, subscriber: BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError> {
        if self
            .used
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(reject(subscriber, SubscribeError::Resubscribed));
        }
        Ok(subscriber)
    }
}
