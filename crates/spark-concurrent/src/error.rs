//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义单值源订阅协议中的错误语义：订阅基数违规、测试替身的前置条件失败与违规聚合；
//! - 让测试报告一次性呈现完整的违规历史，而不是只暴露第一次失败。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，与 `std::error::Error` 生态兼容；
//! - 终止信号携带的错误统一为 [`ErrorCause`]，可克隆，便于测试替身在投递的同时保留一份。

use std::{borrow::Cow, error::Error as StdError, fmt, sync::Arc};

use thiserror::Error;

/// `on_error` 携带的错误载荷。
///
/// 使用 `Arc` 而非 `Box`：终止信号可能被装饰器链、测试替身与观测代码同时持有，
/// 共享所有权避免在每一层重新包装。
pub type ErrorCause = Arc<dyn StdError + Send + Sync + 'static>;

/// 将任意错误包装为 [`ErrorCause`]。
pub fn cause<E>(error: E) -> ErrorCause
where
    E: StdError + Send + Sync + 'static,
{
    Arc::new(error)
}

/// 订阅基数策略，描述一个源允许多少订阅者、是否允许时间上重叠。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CardinalityPolicy {
    /// 允许重复订阅，但同一时刻最多一个活跃订阅者。
    Sequential,
    /// 不限制订阅者数量。
    Concurrent,
    /// 整个生命周期内仅允许一次订阅。
    NonResubscribeable,
}

impl fmt::Display for CardinalityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CardinalityPolicy::Sequential => "sequential",
            CardinalityPolicy::Concurrent => "concurrent",
            CardinalityPolicy::NonResubscribeable => "non-resubscribeable",
        };
        f.write_str(label)
    }
}

/// 测试替身上可手动驱动的信号，用于在错误中指明“哪一次调用失败”。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    OnSubscribe,
    OnSuccess,
    OnError,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Signal::OnSubscribe => "onSubscribe",
            Signal::OnSuccess => "onSuccess",
            Signal::OnError => "onError",
        };
        f.write_str(label)
    }
}

/// 订阅者函数在计算包装订阅者时产生的违规。
///
/// # 教案式说明
/// - **意图 (Why)**：基数装饰器拒绝新订阅者时，需要同时通知被拒绝的订阅者并让调用方记录违规；
/// - **契约 (What)**：
///   - 所有变体均可克隆，拒绝路径会把同一错误既投递给新订阅者，也返回给调用方；
///   - 变体携带足够上下文（策略、原因）以便在聚合报告中定位根因；
/// - **风险 (Trade-offs)**：`Rejected` 为自定义函数预留，原因字符串由调用方负责可读性。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubscribeError {
    /// 顺序策略下，已有活跃订阅者时再次订阅。
    #[error("duplicate subscriber: source already has an active subscriber ({policy} policy)")]
    AlreadySubscribed { policy: CardinalityPolicy },

    /// 不可重订阅策略下的第二次订阅（无论第一次是否已终止）。
    #[error("duplicate subscriber: source permits a single subscription and was already subscribed")]
    Resubscribed,

    /// 调用方自定义的订阅者函数拒绝了订阅。
    #[error("subscriber rejected: {reason}")]
    Rejected { reason: Cow<'static, str> },

    /// 订阅者函数在计算过程中 panic。
    #[error("subscriber function panicked: {message}")]
    Panicked { message: String },
}

impl SubscribeError {
    /// 构造自定义拒绝错误。
    pub fn rejected(reason: impl Into<Cow<'static, str>>) -> Self {
        SubscribeError::Rejected {
            reason: reason.into(),
        }
    }
}

/// 已记录违规的聚合报告。
///
/// # 教案式说明
/// - **意图 (Why)**：测试替身在 `subscribe` 路径上捕获的违规不会立即抛出，而是在下一次手动信号调用时统一暴露；
///   报告需要引用全部违规，保证一次失败即可还原完整历史；
/// - **契约 (What)**：
///   - `source()` 指向第一次违规，其余违规通过 [`ViolationReport::suppressed`] 获取；
///   - `count` 为记录总数，始终 `>= 1`；
/// - **执行逻辑 (How)**：由测试替身对违规列表快照构造，构造后不可变。
#[derive(Clone, Debug, Error)]
#[error("unexpected exception(s) encountered ({count} recorded)")]
pub struct ViolationReport {
    #[source]
    first: ErrorCause,
    suppressed: Vec<ErrorCause>,
    count: usize,
}

impl ViolationReport {
    /// 基于违规快照构造报告；列表为空时返回 `None`。
    pub(crate) fn from_recorded(recorded: &[ErrorCause]) -> Option<Self> {
        let (first, rest) = recorded.split_first()?;
        Some(Self {
            first: Arc::clone(first),
            suppressed: rest.to_vec(),
            count: recorded.len(),
        })
    }

    /// 第一次记录的违规。
    pub fn first(&self) -> &ErrorCause {
        &self.first
    }

    /// 除第一次以外的全部违规，按记录顺序排列。
    pub fn suppressed(&self) -> &[ErrorCause] {
        &self.suppressed
    }

    /// 记录的违规总数。
    pub fn count(&self) -> usize {
        self.count
    }

    /// 按记录顺序遍历全部违规。
    pub fn iter(&self) -> impl Iterator<Item = &ErrorCause> {
        core::iter::once(&self.first).chain(self.suppressed.iter())
    }
}

/// 测试替身手动信号调用的失败。
#[derive(Debug, Error)]
pub enum TestSingleError {
    /// 当前没有被装饰器链接受的订阅者。
    #[error("{signal} without subscriber")]
    NoSubscriber { signal: Signal },

    /// 当前订阅者已经收到过终止信号。
    #[error("{signal} after terminal signal")]
    AlreadyTerminated { signal: Signal },

    /// 之前记录过协议违规，本次调用直接把它们整体抛出。
    #[error(transparent)]
    Violations(#[from] ViolationReport),
}

/// 源在未投递终止信号的情况下丢弃了订阅者，`SingleFuture` 因此无法完成。
#[derive(Clone, Copy, Debug, Default, Error, PartialEq, Eq)]
#[error("single source dropped its subscriber without a terminal signal")]
pub struct AbandonedError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_keeps_every_violation_in_order() {
        let recorded = vec![
            cause(SubscribeError::Resubscribed),
            cause(SubscribeError::rejected("second")),
            cause(SubscribeError::rejected("third")),
        ];
        let report = ViolationReport::from_recorded(&recorded).expect("non-empty list");

        assert_eq!(report.count(), 3);
        assert_eq!(report.suppressed().len(), 2);
        let messages: Vec<String> = report.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                SubscribeError::Resubscribed.to_string(),
                "subscriber rejected: second".to_owned(),
                "subscriber rejected: third".to_owned(),
            ]
        );
        let source = StdError::source(&report).expect("first violation is the source");
        assert_eq!(source.to_string(), SubscribeError::Resubscribed.to_string());
    }

    #[test]
    fn empty_record_has_no_report() {
        assert!(ViolationReport::from_recorded(&[]).is_none());
    }

    #[test]
    fn signal_errors_name_the_signal() {
        let err = TestSingleError::NoSubscriber {
            signal: Signal::OnSuccess,
        };
        assert_eq!(err.to_string(), "onSuccess without subscriber");
        let err = TestSingleError::AlreadyTerminated {
            signal: Signal::OnError,
        };
        assert_eq!(err.to_string(), "onError after terminal signal");
    }
}
