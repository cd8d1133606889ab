//! 订阅者装饰函数：在订阅时把 `Subscriber` 变换为另一个 `Subscriber`。
//!
//! # 教案级导览
//!
//! - **Why**：测试替身的行为（自动 `on_subscribe`、订阅基数约束）都不是源本身的职责，
//!   而是订阅瞬间对订阅者的一层层包装；把它们做成可组合的函数，调用方即可按需拼装或整体替换。
//! - **What**：
//!   - [`SubscriberFunction::apply`] 接收真实订阅者，返回包装后的订阅者；
//!   - 拒绝订阅时返回 [`SubscribeError`]，且实现方应已通过 `on_subscribe` + `on_error` 通知被拒绝的订阅者；
//!   - 组合顺序为“从左到右”：[`and_then`] 的第一个函数包装真实订阅者，第二个函数包装第一个的结果。
//! - **How**：函数对象以 `Arc<dyn SubscriberFunction<T>>` 共享，跨调用的状态（基数声明）放在内部原子量中。

mod auto_on_subscribe;
mod cardinality;

pub use auto_on_subscribe::AutoOnSubscribe;
pub use cardinality::{ConcurrentSubscribers, NonResubscribeable, SequentialSubscribers};

use std::{fmt, marker::PhantomData, sync::Arc};

use crate::{
    cancellable::IgnoreCancel,
    error::{SubscribeError, cause},
    single::BoxSubscriber,
};

/// 订阅者装饰函数。
pub trait SubscriberFunction<T>: Send + Sync {
    /// 计算包装后的订阅者。
    fn apply(&self, subscriber: BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError>;
}

/// 共享的装饰函数对象。
pub type DynSubscriberFunction<T> = Arc<dyn SubscriberFunction<T>>;

impl<T, F> SubscriberFunction<T> for Arc<F>
where
    F: SubscriberFunction<T> + ?Sized,
{
    fn apply(&self, subscriber: BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError> {
        (**self).apply(subscriber)
    }
}

impl<T, F> SubscriberFunction<T> for Box<F>
where
    F: SubscriberFunction<T> + ?Sized,
{
    fn apply(&self, subscriber: BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError> {
        (**self).apply(subscriber)
    }
}

/// 以闭包实现的装饰函数，见 [`from_fn`]。
pub struct FnSubscriberFunction<T, F> {
    function: F,
    _marker: PhantomData<fn(T)>,
}

impl<T, F> SubscriberFunction<T> for FnSubscriberFunction<T, F>
where
    F: Fn(BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError> + Send + Sync,
{
    fn apply(&self, subscriber: BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError> {
        (self.function)(subscriber)
    }
}

impl<T, F> fmt::Debug for FnSubscriberFunction<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSubscriberFunction").finish_non_exhaustive()
    }
}

/// 以闭包构造装饰函数。
pub fn from_fn<T, F>(function: F) -> FnSubscriberFunction<T, F>
where
    F: Fn(BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError> + Send + Sync,
{
    FnSubscriberFunction {
        function,
        _marker: PhantomData,
    }
}

/// 两个装饰函数的顺序组合，见 [`and_then`]。
#[derive(Clone, Debug)]
pub struct AndThen<A, B> {
    first: A,
    second: B,
}

impl<T, A, B> SubscriberFunction<T> for AndThen<A, B>
where
    A: SubscriberFunction<T>,
    B: SubscriberFunction<T>,
{
    fn apply(&self, subscriber: BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError> {
        let wrapped = self.first.apply(subscriber)?;
        self.second.apply(wrapped)
    }
}

/// 组合两个装饰函数：`first` 包装真实订阅者，`second` 包装 `first` 的结果。
///
/// `first` 拒绝时短路返回，`second` 不会被调用。
pub fn and_then<A, B>(first: A, second: B) -> AndThen<A, B> {
    AndThen { first, second }
}

/// 拒绝订阅：先交付空取消句柄，再以 `error` 终止被拒绝的订阅者。
///
/// 返回同一个错误，便于调用方直接 `return Err(reject(..))`。
pub(crate) fn reject<T>(subscriber: BoxSubscriber<T>, error: SubscribeError) -> SubscribeError {
    subscriber.on_subscribe(IgnoreCancel::shared());
    subscriber.on_error(cause(error.clone()));
    error
}
