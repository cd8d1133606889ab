//! 单值异步源（Single）的订阅协议。
//!
//! # 教案级导览
//!
//! - **Why**：工具包中的每个异步操作（请求/响应、命令调用）都以“至多一个值或一个错误”的形式交付，
//!   生产者与消费者之间需要一份严格的信号契约，否则会出现重复投递或死锁。
//! - **What**：
//!   1. [`SingleSource::subscribe`] 是唯一能让 `on_subscribe` 最终触发的入口（直接或经由装饰器）；
//!   2. `on_subscribe` 之后恰好跟随一个终止信号（`on_success` 或 `on_error`），可在任意线程、任意时刻到达，
//!      包括已完成源在 `subscribe` 内部同步投递；
//!   3. 顺序违规（缺失 `on_subscribe`、重复终止）由依赖协议的消费者一侧检测，最小源实现不做内部强制。
//! - **How**：订阅者方法统一取 `&self`，因为同一个订阅者可能被生产者线程与测试线程同时持有；
//!   需要可变状态的实现自行使用内部可变性。

use std::sync::Arc;

use crate::{cancellable::DynCancellable, error::ErrorCause};

/// 单值源的消费者一侧。
///
/// # 契约说明（What）
/// - `on_subscribe`：订阅建立时调用一次，交付取消句柄；
/// - `on_success`：交付结果，`None` 表示“成功但无值”；
/// - `on_error`：交付失败原因；
/// - `on_success` 与 `on_error` 至多二选一投递一次，且不会早于 `on_subscribe`。
pub trait SingleSubscriber<T>: Send + Sync {
    /// 订阅建立，交付取消句柄。
    fn on_subscribe(&self, cancellable: DynCancellable);

    /// 成功终止。
    fn on_success(&self, result: Option<T>);

    /// 失败终止。
    fn on_error(&self, error: ErrorCause);
}

/// 装箱的订阅者，装饰器链以此为输入与输出。
pub type BoxSubscriber<T> = Box<dyn SingleSubscriber<T>>;

impl<T, S> SingleSubscriber<T> for Box<S>
where
    S: SingleSubscriber<T> + ?Sized,
{
    fn on_subscribe(&self, cancellable: DynCancellable) {
        (**self).on_subscribe(cancellable)
    }

    fn on_success(&self, result: Option<T>) {
        (**self).on_success(result)
    }

    fn on_error(&self, error: ErrorCause) {
        (**self).on_error(error)
    }
}

impl<T, S> SingleSubscriber<T> for Arc<S>
where
    S: SingleSubscriber<T> + ?Sized,
{
    fn on_subscribe(&self, cancellable: DynCancellable) {
        (**self).on_subscribe(cancellable)
    }

    fn on_success(&self, result: Option<T>) {
        (**self).on_success(result)
    }

    fn on_error(&self, error: ErrorCause) {
        (**self).on_error(error)
    }
}

/// 单值源的生产者一侧。
///
/// 源只在投递订阅协议所需的时间内持有订阅者，不对其做任何其他假设。
pub trait SingleSource<T>: Send + Sync {
    /// 订阅源。
    fn subscribe(&self, subscriber: BoxSubscriber<T>);
}

impl<T, S> SingleSource<T> for Arc<S>
where
    S: SingleSource<T> + ?Sized,
{
    fn subscribe(&self, subscriber: BoxSubscriber<T>) {
        (**self).subscribe(subscriber)
    }
}

/// [`SingleSource`] 的便捷扩展。
pub trait SingleSourceExt<T>: SingleSource<T> {
    /// 以具体类型订阅，省去调用方手动装箱。
    fn subscribe_with<S>(&self, subscriber: S)
    where
        S: SingleSubscriber<T> + 'static,
    {
        self.subscribe(Box::new(subscriber));
    }

    /// 订阅并把结果桥接为 [`Future`](std::future::Future)；丢弃 Future 会取消订阅。
    fn to_future(&self) -> crate::future::SingleFuture<T>
    where
        T: Send + 'static,
    {
        crate::future::SingleFuture::subscribe(self)
    }
}

impl<T, S> SingleSourceExt<T> for S where S: SingleSource<T> + ?Sized {}
