use std::{fmt, marker::PhantomData, sync::Arc};

use crate::{
    cancellable::{DelegatingCancellable, DynCancellable},
    error::{ErrorCause, SubscribeError},
    single::{BoxSubscriber, SingleSubscriber},
};

use super::SubscriberFunction;

/// 订阅时自动投递 `on_subscribe` 的装饰函数。
///
/// # 教案式说明
/// - **意图 (Why)**：绝大多数测试并不关心取消句柄的来源，只需要订阅者按协议先收到 `on_subscribe`；
///   自动投递让测试只驱动终止信号即可。
/// - **契约 (What)**：
///   - 每次订阅立即向被包装的订阅者投递一个 [`DelegatingCancellable`]；
///   - 之后经由包装订阅者的 `on_subscribe(real)` 不再转发，而是把委托目标切换到 `real`；
///   - 切换前订阅者发出的取消请求会在切换时补发给 `real`，不会丢失；
///   - 终止信号原样转发。
/// - **执行逻辑 (How)**：无跨订阅状态，每次 `apply` 各自创建委托句柄。
pub struct AutoOnSubscribe<T> {
    _marker: PhantomData<fn(T)>,
}

impl<T> AutoOnSubscribe<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for AutoOnSubscribe<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for AutoOnSubscribe<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AutoOnSubscribe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AutoOnSubscribe")
    }
}

impl<T> SubscriberFunction<T> for AutoOnSubscribe<T>
where
    T: Send + 'static,
{
    fn apply(&self, subscriber: BoxSubscriber<T>) -> Result<BoxSubscriber<T>, SubscribeError> {
        let delegate = Arc::new(DelegatingCancellable::new());
        subscriber.on_subscribe(delegate.clone());
        Ok(Box::new(AutoOnSubscribeSubscriber {
            delegate,
            inner: subscriber,
        }))
    }
}

struct AutoOnSubscribeSubscriber<T> {
    delegate: Arc<DelegatingCancellable>,
    inner: BoxSubscriber<T>,
}

impl<T> SingleSubscriber<T> for AutoOnSubscribeSubscriber<T>
where
    T: Send,
{
    fn on_subscribe(&self, cancellable: DynCancellable) {
        self.delegate.set_target(cancellable);
    }

    fn on_success(&self, result: Option<T>) {
        self.inner.on_success(result);
    }

    fn on_error(&self, error: ErrorCause) {
        self.inner.on_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cancellable::CancellationFlag,
        test_util::TestSingleSubscriber,
    };

    #[test]
    fn delivers_on_subscribe_immediately() {
        let subscriber = Arc::new(TestSingleSubscriber::<u8>::new());
        let wrapped = AutoOnSubscribe::<u8>::new()
            .apply(Box::new(subscriber.clone()))
            .expect("auto on-subscribe never rejects");

        assert!(subscriber.subscription_received());
        wrapped.on_success(Some(3));
        assert_eq!(subscriber.take_success(), Some(Some(3)));
        assert!(subscriber.violations().is_empty());
    }

    #[test]
    fn manual_on_subscribe_swaps_delegate_instead_of_forwarding() {
        let subscriber = Arc::new(TestSingleSubscriber::<u8>::new());
        let wrapped = AutoOnSubscribe::<u8>::new()
            .apply(Box::new(subscriber.clone()))
            .expect("auto on-subscribe never rejects");

        let real = Arc::new(CancellationFlag::new());
        wrapped.on_subscribe(real.clone());
        assert_eq!(subscriber.on_subscribe_count(), 1, "手动 on_subscribe 不得重复投递");

        assert!(subscriber.cancel());
        assert!(real.is_cancelled());
    }

    #[test]
    fn cancel_before_swap_reaches_real_target() {
        let subscriber = Arc::new(TestSingleSubscriber::<u8>::new());
        let wrapped = AutoOnSubscribe::<u8>::new()
            .apply(Box::new(subscriber.clone()))
            .expect("auto on-subscribe never rejects");

        assert!(subscriber.cancel());
        let real = Arc::new(CancellationFlag::new());
        wrapped.on_subscribe(real.clone());
        assert!(real.is_cancelled(), "切换前的取消必须补发给真实句柄");
    }
}
