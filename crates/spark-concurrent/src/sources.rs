//! 已完成与永不完成的单值源。
//!
//! 这些源在 `subscribe` 内部同步投递全部信号，是“已完成源在订阅时同步终止”这一协议分支的最小实现，
//! 也常作为装饰器与测试的输入。

use std::marker::PhantomData;

use crate::{
    cancellable::IgnoreCancel,
    error::ErrorCause,
    single::{BoxSubscriber, SingleSource},
};

/// 订阅即成功的源，每个订阅者收到一份结果的克隆。
#[derive(Clone, Debug)]
pub struct Succeeded<T> {
    value: Option<T>,
}

impl<T> SingleSource<T> for Succeeded<T>
where
    T: Clone + Send + Sync,
{
    fn subscribe(&self, subscriber: BoxSubscriber<T>) {
        subscriber.on_subscribe(IgnoreCancel::shared());
        subscriber.on_success(self.value.clone());
    }
}

/// 以给定值成功。
pub fn succeeded<T>(value: T) -> Succeeded<T> {
    Succeeded { value: Some(value) }
}

/// 成功但不携带值。
pub fn succeeded_empty<T>() -> Succeeded<T> {
    Succeeded { value: None }
}

/// 订阅即失败的源。
#[derive(Clone, Debug)]
pub struct Failed<T> {
    cause: ErrorCause,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SingleSource<T> for Failed<T> {
    fn subscribe(&self, subscriber: BoxSubscriber<T>) {
        subscriber.on_subscribe(IgnoreCancel::shared());
        subscriber.on_error(ErrorCause::clone(&self.cause));
    }
}

/// 以给定错误失败。
pub fn failed<T>(cause: ErrorCause) -> Failed<T> {
    Failed {
        cause,
        _marker: PhantomData,
    }
}

/// 只投递 `on_subscribe`、永不终止的源。
#[derive(Clone, Copy, Debug)]
pub struct Never<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SingleSource<T> for Never<T> {
    fn subscribe(&self, subscriber: BoxSubscriber<T>) {
        subscriber.on_subscribe(IgnoreCancel::shared());
    }
}

/// 永不终止。
pub fn never<T>() -> Never<T> {
    Never {
        _marker: PhantomData,
    }
}
