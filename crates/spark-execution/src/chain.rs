//! 客户端策略链：把各组件的卸载声明合成为客户端与连接工厂的有效策略。
//!
//! # 教案级导览
//!
//! - **Why**：客户端装配时按登记顺序逐个添加过滤器、负载均衡器、连接过滤器与连接工厂过滤器；
//!   最终调度方式取决于全部声明的合并，而合并与登记顺序无关。
//! - **What**：
//!   - 客户端过滤器与负载均衡器累积到同一条“客户端链”；连接过滤器、连接工厂过滤器各自独立累积；
//!   - 阶段声明的 `never` 被降级为 `none` 并记录告警，不会成为错误；
//!   - 没有任何卸载需求的声明不参与合并，未登记任何需求的链保持“缺席”；
//!   - [`ClientStrategyChainBuilder::copy`] 复制当前累积值，可为不同路由或租户派生配置。
//! - **How**：每条链是 `Option<策略>`，首次出现需求时直接取值，其后逐次 `merge`。

use std::fmt;

use crate::{
    influencer::{ExecutionStrategyInfluencer, Purpose},
    strategy::{AnyExecutionStrategy, ConnectAndHttpExecutionStrategy, ExecutionStrategy},
};

/// 策略链构建器。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientStrategyChainBuilder {
    client_chain: Option<ExecutionStrategy>,
    connection_filter_chain: Option<ExecutionStrategy>,
    connection_factory_chain: Option<ConnectAndHttpExecutionStrategy>,
}

impl ClientStrategyChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记客户端过滤器。
    pub fn add_client_filter<I>(&mut self, filter: &I) -> &mut Self
    where
        I: ExecutionStrategyInfluencer<Strategy = ExecutionStrategy> + ?Sized,
    {
        self.add_to_client_chain(Purpose::Filter, filter)
    }

    /// 登记负载均衡器，与客户端过滤器共用同一条链。
    pub fn add_load_balancer<I>(&mut self, load_balancer: &I) -> &mut Self
    where
        I: ExecutionStrategyInfluencer<Strategy = ExecutionStrategy> + ?Sized,
    {
        self.add_to_client_chain(Purpose::LoadBalancer, load_balancer)
    }

    /// 登记连接过滤器。
    pub fn add_connection_filter<I>(&mut self, filter: &I) -> &mut Self
    where
        I: ExecutionStrategyInfluencer<Strategy = ExecutionStrategy> + ?Sized,
    {
        let strategy = legal_http_strategy(Purpose::ConnectionFilter, filter);
        if strategy.has_offloads() {
            self.connection_filter_chain = Some(merge_into(self.connection_filter_chain, strategy));
        }
        self
    }

    /// 登记连接工厂过滤器；其需求同时覆盖连接阶段与 HTTP 阶段。
    ///
    /// HTTP 阶段的 `never` 无论以哪种形态出现都降级为 `none`，连接阶段的需求照常并入。
    pub fn add_connection_factory_filter<I>(&mut self, filter: &I) -> &mut Self
    where
        I: ExecutionStrategyInfluencer<Strategy = AnyExecutionStrategy> + ?Sized,
    {
        let mut strategy = filter.required_offloads();
        if strategy.is_never() {
            downgrade_warning(Purpose::ConnectionFactoryFilter, &strategy, filter);
            strategy = strategy.without_never();
        }
        if strategy.has_offloads() {
            self.connection_factory_chain = Some(match self.connection_factory_chain {
                Some(chain) => chain.merge(strategy),
                None => ConnectAndHttpExecutionStrategy::from(strategy),
            });
        }
        self
    }

    /// 客户端有效策略。
    ///
    /// 以传输层基线为起点，依次并入客户端链、连接过滤器链，以及连接工厂链中与 HTTP 阶段相关的部分。
    pub fn build_for_client(&self, transport: ExecutionStrategy) -> ExecutionStrategy {
        let mut strategy = merge_optional(transport, self.client_chain);
        strategy = merge_optional(strategy, self.connection_filter_chain);
        if self.connection_factory_chain.is_some() {
            strategy = strategy.merge(ExecutionStrategy::from(self.build_for_connection_factory()));
        }
        tracing::debug!(%transport, %strategy, "built client execution strategy");
        strategy
    }

    /// 连接工厂有效策略：只保留连接工厂确实需要的阶段。
    ///
    /// | 连接阶段有卸载 | HTTP 阶段为具体集合 | 结果 |
    /// |---|---|---|
    /// | 是 | 是 | 完整组合 |
    /// | 是 | 否（默认或未声明） | 仅连接阶段 |
    /// | 否 | 是 | 仅 HTTP 阶段 |
    /// | 否 | 否 | 不卸载 |
    pub fn build_for_connection_factory(&self) -> AnyExecutionStrategy {
        let Some(chain) = self.connection_factory_chain else {
            return AnyExecutionStrategy::offload_none();
        };
        let connect_specific = chain.connect().has_offloads();
        let http_specific = chain
            .http()
            .offload_points()
            .is_some_and(|points| !points.is_empty());
        let strategy = match (connect_specific, http_specific) {
            (true, true) => AnyExecutionStrategy::ConnectAndHttp(chain),
            (true, false) => AnyExecutionStrategy::Connect(chain.connect()),
            (false, true) => AnyExecutionStrategy::Http(chain.http()),
            (false, false) => AnyExecutionStrategy::offload_none(),
        };
        tracing::debug!(%strategy, "built connection factory execution strategy");
        strategy
    }

    /// 复制出携带当前累积值的独立构建器。
    pub fn copy(&self) -> Self {
        self.clone()
    }

    fn add_to_client_chain<I>(&mut self, purpose: Purpose, influencer: &I) -> &mut Self
    where
        I: ExecutionStrategyInfluencer<Strategy = ExecutionStrategy> + ?Sized,
    {
        let strategy = legal_http_strategy(purpose, influencer);
        if strategy.has_offloads() {
            self.client_chain = Some(merge_into(self.client_chain, strategy));
        }
        self
    }
}

fn legal_http_strategy<I>(purpose: Purpose, influencer: &I) -> ExecutionStrategy
where
    I: ExecutionStrategyInfluencer<Strategy = ExecutionStrategy> + ?Sized,
{
    let strategy = influencer.required_offloads();
    if strategy.is_never() {
        downgrade_warning(purpose, &strategy, influencer);
        return ExecutionStrategy::offload_none();
    }
    strategy
}

fn downgrade_warning<S, I>(purpose: Purpose, strategy: &S, influencer: &I)
where
    S: fmt::Display,
    I: fmt::Debug + ?Sized,
{
    tracing::warn!(
        purpose = %purpose,
        strategy = %strategy,
        influencer = ?influencer,
        "ignoring illegal required strategy, treating it as offload none"
    );
}

fn merge_into(chain: Option<ExecutionStrategy>, strategy: ExecutionStrategy) -> ExecutionStrategy {
    match chain {
        Some(chain) => chain.merge(strategy),
        None => strategy,
    }
}

fn merge_optional(base: ExecutionStrategy, chain: Option<ExecutionStrategy>) -> ExecutionStrategy {
    match chain {
        Some(chain) => base.merge(chain),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        influencer::DeclaredOffloads,
        strategy::{ConnectExecutionStrategy, ConnectOffloadPoint, OffloadPoint},
    };
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn never_contribution_is_downgraded_with_warning() {
        let mut builder = ClientStrategyChainBuilder::new();
        builder.add_client_filter(&DeclaredOffloads::new(
            "inline-only",
            ExecutionStrategy::offload_never(),
        ));

        assert!(logs_contain("ignoring illegal required strategy"));
        assert!(logs_contain("purpose=filter"));
        assert!(logs_contain("inline-only"));
        assert_eq!(builder, ClientStrategyChainBuilder::new());
        assert_eq!(
            builder.build_for_client(ExecutionStrategy::offload_none()),
            ExecutionStrategy::offload_none()
        );
    }

    #[traced_test]
    #[test]
    fn never_connection_factory_contribution_is_downgraded() {
        let mut builder = ClientStrategyChainBuilder::new();
        builder.add_connection_factory_filter(&DeclaredOffloads::new(
            "inline-factory",
            AnyExecutionStrategy::Http(ExecutionStrategy::offload_never()),
        ));

        assert!(logs_contain("purpose=connection factory filter"));
        assert_eq!(
            builder.build_for_connection_factory(),
            AnyExecutionStrategy::offload_none()
        );
    }

    #[traced_test]
    #[test]
    fn combined_never_does_not_cancel_other_factory_http_offloads() {
        let connect = ConnectExecutionStrategy::offload_only(ConnectOffloadPoint::Connect);
        let send = ExecutionStrategy::offload_only(OffloadPoint::Send);
        let mut builder = ClientStrategyChainBuilder::new();
        builder
            .add_connection_factory_filter(&DeclaredOffloads::new(
                "inline-handshake",
                AnyExecutionStrategy::ConnectAndHttp(ConnectAndHttpExecutionStrategy::new(
                    connect,
                    ExecutionStrategy::offload_never(),
                )),
            ))
            .add_connection_factory_filter(&DeclaredOffloads::new(
                "send-offload",
                AnyExecutionStrategy::Http(send),
            ));

        assert!(logs_contain("inline-handshake"));
        assert_eq!(builder.build_for_client(ExecutionStrategy::offload_none()), send);
        assert_eq!(
            builder.build_for_connection_factory(),
            AnyExecutionStrategy::ConnectAndHttp(ConnectAndHttpExecutionStrategy::new(connect, send))
        );
    }

    #[test]
    fn contributions_without_offloads_leave_chain_absent() {
        let mut builder = ClientStrategyChainBuilder::new();
        builder
            .add_connection_filter(&DeclaredOffloads::new("noop", ExecutionStrategy::offload_none()))
            .add_connection_factory_filter(&DeclaredOffloads::new(
                "noop-factory",
                AnyExecutionStrategy::Connect(ConnectExecutionStrategy::offload_none()),
            ));
        assert_eq!(builder, ClientStrategyChainBuilder::new());
    }

    #[test]
    fn connection_factory_http_part_reaches_client_strategy() {
        let mut builder = ClientStrategyChainBuilder::new();
        builder.add_connection_factory_filter(&DeclaredOffloads::new(
            "handshake",
            AnyExecutionStrategy::ConnectAndHttp(ConnectAndHttpExecutionStrategy::new(
                ConnectExecutionStrategy::offload_only(ConnectOffloadPoint::Connect),
                ExecutionStrategy::offload_only(OffloadPoint::Send),
            )),
        ));
        assert_eq!(
            builder.build_for_client(ExecutionStrategy::offload_only(OffloadPoint::Event)),
            ExecutionStrategy::custom()
                .offload(OffloadPoint::Event)
                .offload(OffloadPoint::Send)
                .build()
        );
    }
}
