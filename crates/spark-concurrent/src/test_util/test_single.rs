use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::{
    cancellable::DynCancellable,
    error::{ErrorCause, Signal, SubscribeError, TestSingleError, ViolationReport, cause},
    function::{
        AutoOnSubscribe, ConcurrentSubscribers, DynSubscriberFunction, NonResubscribeable,
        SequentialSubscribers, SubscriberFunction, and_then,
    },
    single::{BoxSubscriber, SingleSource},
};

/// 可由测试手动驱动信号的单值源。
///
/// # 教案式说明
///
/// ## 意图 (Why)
/// - 在隔离环境中断言组件对单值源的反应：测试决定何时、在哪个线程投递 `on_subscribe`、`on_success`、`on_error`；
/// - 订阅路径上的违规（基数冲突、装饰函数失败）不在 `subscribe` 内抛出，而是记录下来，
///   在下一次手动信号调用时整体暴露，使测试报告呈现完整的违规历史。
///
/// ## 逻辑 (How)
/// - 每次 `subscribe` 都把订阅者交给构建时确定的装饰函数，结果连同一个“已终止”标记写入
///   “当前订阅者”槽位（`ArcSwapOption`），后来者覆盖前者；
/// - 违规列表是写时复制的 `ArcSwap<Vec<_>>`，并发追加通过 `rcu` 重试完成，不丢失更新；
/// - 手动信号先检查违规列表，再要求当前订阅者存在，最后转发；
/// - 终止信号以 `swap(true)` 争夺槽位上的标记，只有赢家被转发。
///
/// ## 契约 (What)
/// - 默认：顺序订阅 + 自动 `on_subscribe`；
/// - 违规列表只增不减：记录过违规后，每一次手动信号调用都会返回包含全部违规的 [`ViolationReport`]；
/// - 关闭自动 `on_subscribe` 时，测试需自行调用 [`TestSingle::on_subscribe`]；
/// - 同一个订阅者至多收到一个终止信号，之后的终止调用返回 [`TestSingleError::AlreadyTerminated`]，
///   直到新的订阅者被接受。
pub struct TestSingle<T> {
    function: DynSubscriberFunction<T>,
    violations: ArcSwap<Vec<ErrorCause>>,
    subscriber: ArcSwapOption<Slot<T>>,
}

struct Slot<T> {
    subscriber: BoxSubscriber<T>,
    terminated: AtomicBool,
}

impl<T> TestSingle<T>
where
    T: Send + 'static,
{
    /// 以默认配置创建。
    pub fn new() -> Self {
        TestSingleBuilder::new().build()
    }

    /// 返回构建器。
    pub fn builder() -> TestSingleBuilder<T> {
        TestSingleBuilder::new()
    }

    fn with_function(function: DynSubscriberFunction<T>) -> Self {
        Self {
            function,
            violations: ArcSwap::from_pointee(Vec::new()),
            subscriber: ArcSwapOption::empty(),
        }
    }

    /// 是否至少有一个订阅者被装饰函数接受过。
    pub fn is_subscribed(&self) -> bool {
        self.subscriber.load().is_some()
    }

    /// 向当前订阅者投递 `on_subscribe`。
    ///
    /// 自动 `on_subscribe` 开启时，这会把之前交付的委托句柄切换到 `cancellable`。
    pub fn on_subscribe(&self, cancellable: DynCancellable) -> Result<(), TestSingleError> {
        self.active_slot(Signal::OnSubscribe)?
            .subscriber
            .on_subscribe(cancellable);
        Ok(())
    }

    /// 向当前订阅者投递成功结果。
    pub fn on_success(&self, result: Option<T>) -> Result<(), TestSingleError> {
        self.terminal_slot(Signal::OnSuccess)?
            .subscriber
            .on_success(result);
        Ok(())
    }

    /// 向当前订阅者投递错误。
    pub fn on_error(&self, error: ErrorCause) -> Result<(), TestSingleError> {
        self.terminal_slot(Signal::OnError)?.subscriber.on_error(error);
        Ok(())
    }

    /// 已记录违规的快照。
    pub fn violations(&self) -> Vec<ErrorCause> {
        Vec::clone(&self.violations.load())
    }

    fn active_slot(&self, signal: Signal) -> Result<Arc<Slot<T>>, TestSingleError> {
        if let Some(report) = ViolationReport::from_recorded(&self.violations.load()) {
            return Err(report.into());
        }
        self.subscriber
            .load_full()
            .ok_or(TestSingleError::NoSubscriber { signal })
    }

    fn terminal_slot(&self, signal: Signal) -> Result<Arc<Slot<T>>, TestSingleError> {
        let slot = self.active_slot(signal)?;
        if slot.terminated.swap(true, Ordering::AcqRel) {
            return Err(TestSingleError::AlreadyTerminated { signal });
        }
        Ok(slot)
    }

    fn record(&self, error: ErrorCause) {
        tracing::warn!(error = %error, "unexpected exception recorded by test single");
        self.violations.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(ErrorCause::clone(&error));
            next
        });
    }
}

impl<T> Default for TestSingle<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleSource<T> for TestSingle<T>
where
    T: Send + 'static,
{
    fn subscribe(&self, subscriber: BoxSubscriber<T>) {
        // 自定义装饰函数可能 panic；把它当作违规记录，而不是让 panic 穿过 `subscribe`。
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.function.apply(subscriber)));
        match outcome {
            Ok(Ok(wrapped)) => self.subscriber.store(Some(Arc::new(Slot {
                subscriber: wrapped,
                terminated: AtomicBool::new(false),
            }))),
            Ok(Err(error)) => self.record(cause(error)),
            Err(payload) => self.record(cause(SubscribeError::Panicked {
                message: panic_message(payload.as_ref()),
            })),
        }
    }
}

impl<T> fmt::Debug for TestSingle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSingle")
            .field("subscribed", &self.subscriber.load().is_some())
            .field("violations", &self.violations.load().len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// [`TestSingle`] 的构建器。
///
/// - 基数策略三选一，默认 [`SequentialSubscribers`]；
/// - 自动 `on_subscribe` 默认开启，可替换或关闭；
/// - [`TestSingleBuilder::build`] 先施加基数约束，再在其外层施加自动 `on_subscribe`：
///   信号依次经过自动 `on_subscribe` 与基数包装到达真实订阅者，委托句柄因此经由基数包装交付，
///   取消时可归还顺序租约；被拒绝的订阅者不会再被自动包装，只看到一次 `on_subscribe`；
/// - [`TestSingleBuilder::build_with`] 使用调用方提供的函数，忽略其余全部配置。
pub struct TestSingleBuilder<T> {
    auto_on_subscribe: Option<DynSubscriberFunction<T>>,
    cardinality: DynSubscriberFunction<T>,
}

impl<T> TestSingleBuilder<T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            auto_on_subscribe: Some(Arc::new(AutoOnSubscribe::new())),
            cardinality: Arc::new(SequentialSubscribers::new()),
        }
    }

    /// 允许并发订阅者。
    pub fn concurrent_subscribers(self) -> Self {
        self.concurrent_subscribers_with(ConcurrentSubscribers::new())
    }

    /// 允许并发订阅者，使用调用方持有的策略句柄。
    pub fn concurrent_subscribers_with(mut self, function: ConcurrentSubscribers<T>) -> Self {
        self.cardinality = Arc::new(function);
        self
    }

    /// 只允许顺序订阅者（默认）。
    pub fn sequential_subscribers(self) -> Self {
        self.sequential_subscribers_with(SequentialSubscribers::new())
    }

    pub fn sequential_subscribers_with(mut self, function: SequentialSubscribers<T>) -> Self {
        self.cardinality = Arc::new(function);
        self
    }

    /// 只允许一个订阅者。
    pub fn single_subscriber(self) -> Self {
        self.single_subscriber_with(NonResubscribeable::new())
    }

    pub fn single_subscriber_with(mut self, function: NonResubscribeable<T>) -> Self {
        self.cardinality = Arc::new(function);
        self
    }

    /// 开启自动 `on_subscribe`（默认）。
    pub fn auto_on_subscribe(self) -> Self {
        self.auto_on_subscribe_with(AutoOnSubscribe::new())
    }

    pub fn auto_on_subscribe_with(mut self, function: AutoOnSubscribe<T>) -> Self {
        self.auto_on_subscribe = Some(Arc::new(function));
        self
    }

    /// 关闭自动 `on_subscribe`。
    pub fn disable_auto_on_subscribe(mut self) -> Self {
        self.auto_on_subscribe = None;
        self
    }

    /// 按当前配置构建。
    pub fn build(self) -> TestSingle<T> {
        let function: DynSubscriberFunction<T> = match self.auto_on_subscribe {
            Some(auto_on_subscribe) => Arc::new(and_then(self.cardinality, auto_on_subscribe)),
            None => self.cardinality,
        };
        TestSingle::with_function(function)
    }

    /// 以调用方提供的装饰函数构建，其余配置全部忽略。
    pub fn build_with<F>(self, function: F) -> TestSingle<T>
    where
        F: SubscriberFunction<T> + 'static,
    {
        TestSingle::with_function(Arc::new(function))
    }
}

impl<T> Default for TestSingleBuilder<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{function::from_fn, test_util::TestSingleSubscriber};
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn recorded_violation_is_logged_and_surfaces_on_next_signal() {
        let single = TestSingle::<u8>::builder().single_subscriber().build();
        single.subscribe(Box::new(TestSingleSubscriber::new()));
        single.subscribe(Box::new(TestSingleSubscriber::new()));

        assert!(logs_contain("unexpected exception recorded by test single"));
        let err = single.on_success(Some(1)).expect_err("violation must surface");
        match err {
            TestSingleError::Violations(report) => assert_eq!(report.count(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn panicking_function_is_recorded_not_propagated() {
        let single = TestSingle::<u8>::builder()
            .build_with(from_fn(|_subscriber: BoxSubscriber<u8>| panic!("decorator exploded")));
        single.subscribe(Box::new(TestSingleSubscriber::new()));

        assert!(!single.is_subscribed());
        let violations = single.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].to_string(),
            "subscriber function panicked: decorator exploded"
        );
    }
}
