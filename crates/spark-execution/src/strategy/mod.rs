//! 执行策略：组件声明自己需要在哪些阶段卸载到工作线程。
//!
//! # 教案级导览
//!
//! - **Why**：客户端流水线由过滤器、负载均衡器、连接工厂等阶段组成，每个阶段只知道自己是否会阻塞；
//!   流水线的实际调度方式必须由所有阶段的声明合成，而不能由任何单个阶段拍板。
//! - **What**：
//!   - [`ExecutionStrategy`]：HTTP 层策略，取值为“默认”“从不卸载”或一个卸载点集合；
//!   - [`ConnectExecutionStrategy`]：连接阶段策略（建连、关闭）；
//!   - [`ConnectAndHttpExecutionStrategy`]：连接工厂同时作用于两个阶段时的组合表示；
//!   - [`AnyExecutionStrategy`]：连接工厂过滤器可以声明的三种形态之一。
//! - **How**：合并是半格上的并（join），偏序为 `none < default < 非空集合（按包含） < never`；
//!   因此合并满足交换律、结合律、幂等律，`none` 为单位元，登记顺序不影响结果。

mod connect;
mod points;

pub use connect::{
    AnyExecutionStrategy, ConnectAndHttpExecutionStrategy, ConnectExecutionStrategy,
    ConnectOffloadPoint,
};
pub use points::{OffloadPoint, OffloadPoints};

use std::{fmt, str::FromStr};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
};

use crate::error::StrategyParseError;

/// HTTP 层执行策略。
///
/// ## 契约定义（What）
/// - `Default`：未声明具体需求；没有更具体的声明时按“全部卸载”解释，故 [`has_offloads`](Self::has_offloads) 为真；
/// - `Never`：承诺不做任何阻塞工作、不需要卸载；它不是合法的阶段级需求，只能由整体配置给出，
///   在合并中吸收一切；
/// - `Offloads(points)`：显式的卸载点集合，空集即 `none`（“没有要求”）。
///
/// ## 设计权衡（Trade-offs）
/// - `none` 与 `never` 语义不同：前者是“我没有要求”，后者是“禁止卸载”；
///   混淆二者会让单个阶段关闭整条流水线的卸载，因此策略链在入口处把阶段声明的 `never` 降级为 `none`。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStrategy {
    Default,
    Never,
    Offloads(OffloadPoints),
}

impl ExecutionStrategy {
    /// 不卸载任何阶段。
    #[inline]
    pub const fn offload_none() -> Self {
        Self::Offloads(OffloadPoints::empty())
    }

    /// 卸载全部阶段。
    #[inline]
    pub const fn offload_all() -> Self {
        Self::Offloads(OffloadPoints::all())
    }

    #[inline]
    pub const fn offload_never() -> Self {
        Self::Never
    }

    #[inline]
    pub const fn default_strategy() -> Self {
        Self::Default
    }

    /// 仅卸载单个阶段。
    #[inline]
    pub const fn offload_only(point: OffloadPoint) -> Self {
        Self::Offloads(OffloadPoints::empty().with(point))
    }

    /// 逐个声明卸载点的构建器。
    pub fn custom() -> ExecutionStrategyBuilder {
        ExecutionStrategyBuilder::default()
    }

    /// 是否需要任何卸载。
    #[inline]
    pub const fn has_offloads(self) -> bool {
        match self {
            Self::Default => true,
            Self::Never => false,
            Self::Offloads(points) => !points.is_empty(),
        }
    }

    /// 指定阶段是否被卸载。
    #[inline]
    pub const fn is_offloaded(self, point: OffloadPoint) -> bool {
        match self {
            Self::Default => true,
            Self::Never => false,
            Self::Offloads(points) => points.contains(point),
        }
    }

    #[inline]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }

    #[inline]
    pub const fn is_never(self) -> bool {
        matches!(self, Self::Never)
    }

    /// 显式卸载点集合；`Default` 与 `Never` 返回 `None`。
    #[inline]
    pub const fn offload_points(self) -> Option<OffloadPoints> {
        match self {
            Self::Offloads(points) => Some(points),
            Self::Default | Self::Never => None,
        }
    }

    /// 合并两个策略，结果满足双方的需求。
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Never, _) | (_, Self::Never) => Self::Never,
            (Self::Offloads(left), Self::Offloads(right)) => Self::Offloads(left.union(right)),
            (Self::Default, Self::Offloads(points)) | (Self::Offloads(points), Self::Default) => {
                if points.is_empty() {
                    Self::Default
                } else {
                    Self::Offloads(points)
                }
            }
            (Self::Default, Self::Default) => Self::Default,
        }
    }
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        Self::Default
    }
}

impl From<OffloadPoints> for ExecutionStrategy {
    fn from(points: OffloadPoints) -> Self {
        Self::Offloads(points)
    }
}

impl fmt::Debug for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionStrategy({self})")
    }
}

/// `default`、`never`、`none`、`all`，或以逗号连接的卸载点名称。
impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Never => f.write_str("never"),
            Self::Offloads(points) if points.is_all() => f.write_str("all"),
            Self::Offloads(points) => fmt::Display::fmt(points, f),
        }
    }
}

impl FromStr for ExecutionStrategy {
    type Err = StrategyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" => Err(StrategyParseError::Empty),
            "default" => Ok(Self::Default),
            "never" => Ok(Self::Never),
            "none" => Ok(Self::offload_none()),
            "all" => Ok(Self::offload_all()),
            list => list
                .split(',')
                .map(|name| name.trim().parse::<OffloadPoint>())
                .collect::<Result<OffloadPoints, _>>()
                .map(Self::Offloads),
        }
    }
}

impl Serialize for ExecutionStrategy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Default => serializer.serialize_str("default"),
            Self::Never => serializer.serialize_str("never"),
            Self::Offloads(points) if points.is_empty() => serializer.serialize_str("none"),
            Self::Offloads(points) if points.is_all() => serializer.serialize_str("all"),
            Self::Offloads(points) => {
                let mut seq = serializer.serialize_seq(Some(points.iter().count()))?;
                for point in points.iter() {
                    seq.serialize_element(&point)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ExecutionStrategy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StrategyVisitor)
    }
}

struct StrategyVisitor;

impl<'de> Visitor<'de> for StrategyVisitor {
    type Value = ExecutionStrategy;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("`default`, `never`, `none`, `all` or a list of offload point names")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        value.parse().map_err(E::custom)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut points = OffloadPoints::empty();
        while let Some(point) = seq.next_element::<OffloadPoint>()? {
            points = points.with(point);
        }
        Ok(ExecutionStrategy::Offloads(points))
    }
}

/// [`ExecutionStrategy::custom`] 返回的构建器。
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecutionStrategyBuilder {
    points: OffloadPoints,
}

impl ExecutionStrategyBuilder {
    /// 追加一个卸载点。
    #[must_use]
    pub fn offload(mut self, point: OffloadPoint) -> Self {
        self.points = self.points.with(point);
        self
    }

    pub fn build(self) -> ExecutionStrategy {
        ExecutionStrategy::Offloads(self.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_orders_none_below_default_below_sets_below_never() {
        let none = ExecutionStrategy::offload_none();
        let default = ExecutionStrategy::default_strategy();
        let data = ExecutionStrategy::offload_only(OffloadPoint::ReceiveData);

        assert_eq!(none.merge(default), default);
        assert_eq!(default.merge(data), data);
        assert_eq!(data.merge(ExecutionStrategy::offload_never()), ExecutionStrategy::Never);
        assert_eq!(
            data.merge(ExecutionStrategy::offload_only(OffloadPoint::Event)),
            ExecutionStrategy::custom()
                .offload(OffloadPoint::ReceiveData)
                .offload(OffloadPoint::Event)
                .build()
        );
    }

    #[test]
    fn queries_distinguish_none_default_and_never() {
        assert!(!ExecutionStrategy::offload_none().has_offloads());
        assert!(ExecutionStrategy::default_strategy().has_offloads());
        assert!(!ExecutionStrategy::offload_never().has_offloads());
        assert!(ExecutionStrategy::default_strategy().is_offloaded(OffloadPoint::Close));
        assert!(!ExecutionStrategy::offload_only(OffloadPoint::Send).is_offloaded(OffloadPoint::Close));
    }

    #[test]
    fn text_form_round_trips() {
        let strategies = [
            ExecutionStrategy::default_strategy(),
            ExecutionStrategy::offload_never(),
            ExecutionStrategy::offload_none(),
            ExecutionStrategy::offload_all(),
            ExecutionStrategy::offload_only(OffloadPoint::ReceiveMetadata)
                .merge(ExecutionStrategy::offload_only(OffloadPoint::Close)),
        ];
        for strategy in strategies {
            assert_eq!(strategy.to_string().parse::<ExecutionStrategy>(), Ok(strategy));
        }
        assert_eq!(
            " send , event ".parse::<ExecutionStrategy>(),
            Ok(ExecutionStrategy::custom()
                .offload(OffloadPoint::Send)
                .offload(OffloadPoint::Event)
                .build())
        );
        assert_eq!("".parse::<ExecutionStrategy>(), Err(StrategyParseError::Empty));
    }
}
