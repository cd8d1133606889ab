//! 取消能力：表达“停止进行中的操作”的最小契约。
//!
//! # 教案级导览
//! - **Why**：单值源的消费者只持有一个取消句柄，生产者据此决定是否提前结束工作；
//!   句柄可能在任意线程、在终止信号前后被调用任意多次。
//! - **What**：[`Cancellable::cancel`] 必须幂等、不得 panic，终止信号投递后调用为 no-op；
//!   取消是协作式信号，而非强制中断。
//! - **How**：本模块提供若干常用实现：
//!   - [`IgnoreCancel`]：已完成源使用的空实现；
//!   - [`CancellationFlag`]：基于原子位的可查询实现；
//!   - [`FnCancellable`]：最多执行一次回调；
//!   - [`DelegatingCancellable`]：目标可替换的委托句柄，替换前的取消请求会转发给新目标。

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

/// 取消能力。
///
/// # 契约说明（What）
/// - `cancel` 可调用零次、一次或多次，首次之后的调用不得产生额外可观测效果；
/// - 实现可能与终止信号并发执行：竞争允许存在，但输掉竞争的取消不得导致第二个终止信号。
pub trait Cancellable: Send + Sync {
    /// 请求取消。
    fn cancel(&self);
}

/// 以共享所有权传递的取消句柄。
pub type DynCancellable = Arc<dyn Cancellable>;

impl<C> Cancellable for Arc<C>
where
    C: Cancellable + ?Sized,
{
    fn cancel(&self) {
        (**self).cancel()
    }
}

impl<C> Cancellable for Box<C>
where
    C: Cancellable + ?Sized,
{
    fn cancel(&self) {
        (**self).cancel()
    }
}

/// 忽略取消请求的空实现，适用于同步完成的源。
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreCancel;

impl IgnoreCancel {
    /// 返回可直接交给 `on_subscribe` 的共享句柄。
    pub fn shared() -> DynCancellable {
        Arc::new(IgnoreCancel)
    }
}

impl Cancellable for IgnoreCancel {
    fn cancel(&self) {}
}

/// 基于原子位的取消标记。
///
/// 生产者轮询 [`CancellationFlag::is_cancelled`] 决定是否提前退出；
/// 重复取消只会重复写入同一个值。
#[derive(Debug, Default)]
pub struct CancellationFlag {
    flag: AtomicBool,
}

impl CancellationFlag {
    /// 创建处于“未取消”状态的标记。
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// 查询是否已被取消。
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Cancellable for CancellationFlag {
    fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// 最多执行一次回调的取消句柄。
pub struct FnCancellable<F> {
    action: Mutex<Option<F>>,
}

impl<F> FnCancellable<F>
where
    F: FnOnce() + Send,
{
    /// 以回调构造取消句柄。
    pub fn new(action: F) -> Self {
        Self {
            action: Mutex::new(Some(action)),
        }
    }
}

impl<F> Cancellable for FnCancellable<F>
where
    F: FnOnce() + Send,
{
    fn cancel(&self) {
        // 先出锁再执行回调，回调内部可能重入 cancel。
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }
}

impl<F> fmt::Debug for FnCancellable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCancellable")
            .field("armed", &self.action.lock().is_some())
            .finish()
    }
}

/// 便捷构造：以闭包创建共享取消句柄。
pub fn from_fn<F>(action: F) -> DynCancellable
where
    F: FnOnce() + Send + 'static,
{
    Arc::new(FnCancellable::new(action))
}

/// 目标可替换的委托取消句柄。
///
/// # 设计背景（Why）
/// - 自动 `on_subscribe` 需要在真实取消句柄出现之前就交给订阅者一个稳定的句柄；
///   之后测试通过手动 `on_subscribe` 提供真实句柄时，委托目标随之切换。
///
/// # 契约说明（What）
/// - 目标未设置时调用 `cancel`，请求会被记住，并在 [`DelegatingCancellable::set_target`] 时转发给新目标；
/// - 目标已设置时调用 `cancel`，立即转发；
/// - 替换目标不会撤销已记住的取消请求，新目标同样会收到取消。
///
/// # 逻辑解析（How）
/// - `target` 为 `ArcSwapOption` 槽位，读写均为原子替换；
/// - `cancelled` 以 `SeqCst` 读写：`cancel` 先写位再读槽，`set_target` 先写槽再读位，
///   两条路径至少有一条观测到对方，因此取消不会丢失。
///
/// # 风险提示（Trade-offs）
/// - 并发交错下目标可能被取消两次；这依赖 [`Cancellable`] 的幂等契约。
#[derive(Default)]
pub struct DelegatingCancellable {
    target: ArcSwapOption<DynCancellable>,
    cancelled: AtomicBool,
}

impl DelegatingCancellable {
    /// 创建尚未绑定目标的委托句柄。
    pub fn new() -> Self {
        Self::default()
    }

    /// 切换委托目标，并补发替换前收到的取消请求。
    pub fn set_target(&self, target: DynCancellable) {
        self.target.store(Some(Arc::new(Arc::clone(&target))));
        if self.cancelled.load(Ordering::SeqCst) {
            target.cancel();
        }
    }

    /// 是否已收到过取消请求。
    pub fn is_cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 是否已经绑定过目标。
    pub fn has_target(&self) -> bool {
        self.target.load().is_some()
    }
}

impl Cancellable for DelegatingCancellable {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(target) = self.target.load_full() {
            target.cancel();
        }
    }
}

impl fmt::Debug for DelegatingCancellable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatingCancellable")
            .field("has_target", &self.has_target())
            .field("cancel_requested", &self.is_cancel_requested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[derive(Default)]
    struct CountingCancellable {
        calls: AtomicUsize,
    }

    impl Cancellable for CountingCancellable {
        fn cancel(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn flag_cancel_is_idempotent() {
        let flag = CancellationFlag::new();
        assert!(!flag.is_cancelled());
        for _ in 0..5 {
            flag.cancel();
        }
        assert!(flag.is_cancelled());
    }

    #[test]
    fn fn_cancellable_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = {
            let calls = Arc::clone(&calls);
            from_fn(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        handle.cancel();
        handle.cancel();
        handle.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "重复取消不得重复执行回调");
    }

    #[test]
    fn delegating_forwards_pending_cancel_on_swap() {
        let delegate = DelegatingCancellable::new();
        delegate.cancel();
        assert!(delegate.is_cancel_requested());

        let target = Arc::new(CountingCancellable::default());
        delegate.set_target(target.clone());
        assert_eq!(target.calls.load(Ordering::SeqCst), 1, "替换前的取消必须补发");
    }

    #[test]
    fn delegating_forwards_after_swap() {
        let delegate = DelegatingCancellable::new();
        let target = Arc::new(CountingCancellable::default());
        delegate.set_target(target.clone());
        assert_eq!(target.calls.load(Ordering::SeqCst), 0);

        delegate.cancel();
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delegating_concurrent_cancel_and_swap_never_loses_cancel() {
        for _ in 0..200 {
            let delegate = Arc::new(DelegatingCancellable::new());
            let target = Arc::new(CountingCancellable::default());

            let canceller = {
                let delegate = Arc::clone(&delegate);
                thread::spawn(move || delegate.cancel())
            };
            let swapper = {
                let delegate = Arc::clone(&delegate);
                let target = target.clone();
                thread::spawn(move || delegate.set_target(target))
            };
            canceller.join().expect("取消线程不应 panic");
            swapper.join().expect("替换线程不应 panic");

            assert!(
                target.calls.load(Ordering::SeqCst) >= 1,
                "无论交错顺序如何，目标都必须收到取消"
            );
        }
    }
}
