//! 影响执行策略的组件契约。

use std::{borrow::Cow, fmt, sync::Arc};

use serde::Deserialize;

/// 声明自身卸载需求的流水线组件。
///
/// ## 契约定义（What）
/// - `required_offloads` 只描述组件自身会阻塞的阶段，不考虑流水线中的其他组件；
/// - 返回值由策略链合并，组件无法通过返回 `never` 关闭整条流水线的卸载；
/// - `Debug` 输出会出现在策略链的诊断日志中，应能定位到具体组件。
pub trait ExecutionStrategyInfluencer: fmt::Debug {
    /// 组件声明的策略形态。
    type Strategy;

    fn required_offloads(&self) -> Self::Strategy;
}

impl<I> ExecutionStrategyInfluencer for Arc<I>
where
    I: ExecutionStrategyInfluencer + ?Sized,
{
    type Strategy = I::Strategy;

    fn required_offloads(&self) -> Self::Strategy {
        (**self).required_offloads()
    }
}

impl<I> ExecutionStrategyInfluencer for &I
where
    I: ExecutionStrategyInfluencer + ?Sized,
{
    type Strategy = I::Strategy;

    fn required_offloads(&self) -> Self::Strategy {
        (**self).required_offloads()
    }
}

/// 组件在客户端流水线中的角色，仅用于诊断。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    Filter,
    LoadBalancer,
    ConnectionFactoryFilter,
    ConnectionFilter,
}

impl Purpose {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::LoadBalancer => "load balancer",
            Self::ConnectionFactoryFilter => "connection factory filter",
            Self::ConnectionFilter => "connection filter",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 以配置声明卸载需求的组件描述。
///
/// 客户端装配代码从配置文件读取每个组件的名称与需求，再把它们按登记顺序交给策略链：
///
/// ```toml
/// name = "retry"
/// offloads = ["receive_data", "event"]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DeclaredOffloads<S> {
    name: Cow<'static, str>,
    offloads: S,
}

impl<S> DeclaredOffloads<S> {
    pub fn new(name: impl Into<Cow<'static, str>>, offloads: S) -> Self {
        Self {
            name: name.into(),
            offloads,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S> ExecutionStrategyInfluencer for DeclaredOffloads<S>
where
    S: Copy + fmt::Debug,
{
    type Strategy = S;

    fn required_offloads(&self) -> S {
        self.offloads
    }
}
