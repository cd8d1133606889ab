//! 单值源到 `Future` 的桥接。
//!
//! # 契约说明（What）
//! - 订阅在 [`SingleFuture::subscribe`] 时立即发生，而不是在首次 `poll` 时；
//! - 终止前丢弃 Future 会调用源交付的取消句柄；终止后丢弃不产生任何信号；
//! - 源丢弃订阅者却未终止时，Future 以 [`AbandonedError`] 完成，而不是永久挂起。

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::channel::oneshot;
use parking_lot::Mutex;

use crate::{
    cancellable::{Cancellable, DelegatingCancellable, DynCancellable},
    error::{AbandonedError, ErrorCause, cause},
    single::{SingleSource, SingleSubscriber},
};

type Outcome<T> = Result<Option<T>, ErrorCause>;

/// 订阅单值源得到的 Future。
#[must_use = "futures do nothing unless polled; dropping it cancels the subscription"]
pub struct SingleFuture<T> {
    receiver: oneshot::Receiver<Outcome<T>>,
    cancellable: Arc<DelegatingCancellable>,
    completed: bool,
}

impl<T> SingleFuture<T>
where
    T: Send + 'static,
{
    /// 订阅 `source` 并返回等待其终止信号的 Future。
    pub fn subscribe<S>(source: &S) -> Self
    where
        S: SingleSource<T> + ?Sized,
    {
        let (sender, receiver) = oneshot::channel();
        let cancellable = Arc::new(DelegatingCancellable::new());
        source.subscribe(Box::new(FutureSubscriber {
            sender: Mutex::new(Some(sender)),
            cancellable: Arc::clone(&cancellable),
        }));
        Self {
            receiver,
            cancellable,
            completed: false,
        }
    }
}

impl<T> Future for SingleFuture<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => {
                this.completed = true;
                Poll::Ready(outcome)
            }
            Poll::Ready(Err(oneshot::Canceled)) => {
                this.completed = true;
                Poll::Ready(Err(cause(AbandonedError)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for SingleFuture<T> {
    fn drop(&mut self) {
        if !self.completed {
            self.cancellable.cancel();
        }
    }
}

struct FutureSubscriber<T> {
    sender: Mutex<Option<oneshot::Sender<Outcome<T>>>>,
    cancellable: Arc<DelegatingCancellable>,
}

impl<T> FutureSubscriber<T> {
    fn complete(&self, outcome: Outcome<T>) {
        // 重复终止属于生产者违规，这里只保留第一次结果。
        let sender = self.sender.lock().take();
        if let Some(sender) = sender {
            let _ = sender.send(outcome);
        }
    }
}

impl<T> SingleSubscriber<T> for FutureSubscriber<T>
where
    T: Send,
{
    fn on_subscribe(&self, cancellable: DynCancellable) {
        self.cancellable.set_target(cancellable);
    }

    fn on_success(&self, result: Option<T>) {
        self.complete(Ok(result));
    }

    fn on_error(&self, error: ErrorCause) {
        self.complete(Err(error));
    }
}
