#![deny(unsafe_code)]

//! `spark-concurrent` 定义单值异步源（Single）的订阅协议及其测试工具。
//!
//! # 模块定位（Why）
//! - 请求/响应、命令调用等异步操作都以“至多一个值或一个错误”交付，
//!   生产者、消费者与测试之间需要一份共同的信号契约；
//! - 测试替身需要模拟真实源的订阅基数与 `on_subscribe` 时序，且在多线程竞争下保持确定的结论。
//!
//! # 设计概要（How）
//! - `single` 定义订阅者与源的 trait；`cancellable` 提供幂等取消句柄与可延迟绑定的委托句柄；
//! - `function` 把“订阅瞬间对订阅者的包装”抽象为可组合的装饰函数，基数约束与自动 `on_subscribe` 都是其实现；
//! - `test_util` 在装饰函数之上组装 [`TestSingle`]，违规被记录而非抛出，在下一次手动信号时统一暴露；
//! - `future` 把任意源桥接为 `Future`，供异步代码直接 `.await`。
//!
//! # 命名约定（Consistency）
//! - 信号名沿用 `on_subscribe` / `on_success` / `on_error`，日志与错误文本中使用驼峰形式 `onSubscribe` 等。

pub mod cancellable;
pub mod error;
pub mod function;
pub mod future;
pub mod single;
pub mod sources;
#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use cancellable::{Cancellable, DelegatingCancellable, DynCancellable, IgnoreCancel};
pub use error::{
    AbandonedError, CardinalityPolicy, ErrorCause, Signal, SubscribeError, TestSingleError,
    ViolationReport, cause,
};
pub use function::{
    AutoOnSubscribe, ConcurrentSubscribers, DynSubscriberFunction, NonResubscribeable,
    SequentialSubscribers, SubscriberFunction, and_then,
};
pub use future::SingleFuture;
pub use single::{BoxSubscriber, SingleSource, SingleSourceExt, SingleSubscriber};
#[cfg(any(test, feature = "test-util"))]
pub use test_util::{TestSingle, TestSingleBuilder, TestSingleSubscriber};
