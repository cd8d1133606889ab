use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    cancellable::{Cancellable, DynCancellable},
    error::ErrorCause,
    single::SingleSubscriber,
};

/// 订阅者一侧观测到的协议违规。
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// `on_subscribe` 被投递了不止一次。
    #[error("onSubscribe delivered more than once")]
    DuplicateOnSubscribe,
    /// 终止信号早于 `on_subscribe` 到达。
    #[error("terminal signal delivered before onSubscribe")]
    TerminalWithoutSubscribe,
    /// 同一订阅者收到第二个终止信号。
    #[error("terminal signal delivered more than once")]
    DuplicateTerminal,
}

/// 记录到的终止信号。
#[derive(Clone)]
pub enum Terminal<T> {
    Success(Option<T>),
    Error(ErrorCause),
}

impl<T: fmt::Debug> fmt::Debug for Terminal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Success(result) => f.debug_tuple("Success").field(result).finish(),
            Terminal::Error(error) => f.debug_tuple("Error").field(&error.to_string()).finish(),
        }
    }
}

struct RecorderState<T> {
    cancellable: Option<DynCancellable>,
    on_subscribe_count: usize,
    terminal: Option<Terminal<T>>,
    terminal_count: usize,
    violations: Vec<ProtocolViolation>,
}

/// 记录信号的测试订阅者。
///
/// # 教案式说明
/// - **意图 (Why)**：订阅协议的顺序违规由消费者一侧检测，测试需要一个会“记账”的订阅者来断言
///   `on_subscribe` 先于终止、终止至多一次；
/// - **契约 (What)**：
///   - 第一个终止信号被保存，之后的终止信号不覆盖它，只记为 [`ProtocolViolation::DuplicateTerminal`]；
///   - [`TestSingleSubscriber::cancel`] 通过最近一次收到的取消句柄发出取消，句柄调用在锁外进行；
/// - **风险 (Trade-offs)**：内部使用 `parking_lot::Mutex`，只用于测试，不追求无锁。
pub struct TestSingleSubscriber<T> {
    state: Mutex<RecorderState<T>>,
}

impl<T> TestSingleSubscriber<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecorderState {
                cancellable: None,
                on_subscribe_count: 0,
                terminal: None,
                terminal_count: 0,
                violations: Vec::new(),
            }),
        }
    }

    /// 是否收到过 `on_subscribe`。
    pub fn subscription_received(&self) -> bool {
        self.state.lock().on_subscribe_count > 0
    }

    pub fn on_subscribe_count(&self) -> usize {
        self.state.lock().on_subscribe_count
    }

    /// 通过收到的取消句柄请求取消；尚未收到 `on_subscribe` 时返回 `false`。
    pub fn cancel(&self) -> bool {
        let cancellable = self.state.lock().cancellable.clone();
        match cancellable {
            Some(cancellable) => {
                cancellable.cancel();
                true
            }
            None => false,
        }
    }

    /// 是否收到过终止信号。
    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminal_count > 0
    }

    /// 收到的终止信号总数，正常情况下不超过 1。
    pub fn terminal_count(&self) -> usize {
        self.state.lock().terminal_count
    }

    /// 取走成功结果：未终止或以错误终止时返回 `None`。
    pub fn take_success(&self) -> Option<Option<T>> {
        let mut state = self.state.lock();
        match state.terminal.take() {
            Some(Terminal::Success(result)) => Some(result),
            other => {
                state.terminal = other;
                None
            }
        }
    }

    /// 以错误终止时返回该错误。
    pub fn error(&self) -> Option<ErrorCause> {
        match &self.state.lock().terminal {
            Some(Terminal::Error(error)) => Some(ErrorCause::clone(error)),
            _ => None,
        }
    }

    /// 观测到的全部协议违规。
    pub fn violations(&self) -> Vec<ProtocolViolation> {
        self.state.lock().violations.clone()
    }

    fn terminate(&self, terminal: Terminal<T>) {
        let mut state = self.state.lock();
        if state.on_subscribe_count == 0 {
            state.violations.push(ProtocolViolation::TerminalWithoutSubscribe);
        }
        state.terminal_count += 1;
        if state.terminal_count > 1 {
            state.violations.push(ProtocolViolation::DuplicateTerminal);
            return;
        }
        state.terminal = Some(terminal);
    }
}

impl<T> TestSingleSubscriber<T>
where
    T: Clone,
{
    /// 克隆出最近一次记录的终止信号（若仍未被取走）。
    pub fn terminal(&self) -> Option<Terminal<T>> {
        self.state.lock().terminal.clone()
    }
}

impl<T> Default for TestSingleSubscriber<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TestSingleSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TestSingleSubscriber")
            .field("on_subscribe_count", &state.on_subscribe_count)
            .field("terminal_count", &state.terminal_count)
            .field("violations", &state.violations)
            .finish()
    }
}

impl<T> SingleSubscriber<T> for TestSingleSubscriber<T>
where
    T: Send,
{
    fn on_subscribe(&self, cancellable: DynCancellable) {
        let mut state = self.state.lock();
        state.on_subscribe_count += 1;
        if state.on_subscribe_count > 1 {
            state.violations.push(ProtocolViolation::DuplicateOnSubscribe);
        }
        state.cancellable = Some(cancellable);
    }

    fn on_success(&self, result: Option<T>) {
        self.terminate(Terminal::Success(result));
    }

    fn on_error(&self, error: ErrorCause) {
        self.terminate(Terminal::Error(error));
    }
}
