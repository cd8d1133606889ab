use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::StrategyParseError;

use super::{ExecutionStrategy, OffloadPoint};

/// 连接阶段可被卸载的动作。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectOffloadPoint {
    /// 建立连接（含握手）。
    Connect,
    /// 关闭连接。
    Close,
}

impl ConnectOffloadPoint {
    pub const ALL: [ConnectOffloadPoint; 2] = [ConnectOffloadPoint::Connect, ConnectOffloadPoint::Close];

    #[inline]
    const fn bit(self) -> u8 {
        match self {
            Self::Connect => 1 << 0,
            Self::Close => 1 << 1,
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Close => "close",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "connect" => Some(Self::Connect),
            "close" => Some(Self::Close),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectOffloadPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectOffloadPoint {
    type Err = StrategyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| StrategyParseError::UnknownConnectOffloadPoint {
            name: value.to_owned(),
        })
    }
}

/// 连接阶段执行策略：`{connect, close}` 的子集。
///
/// 配置中写作卸载点名称列表，例如 `["connect"]`；空列表即不卸载。
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<ConnectOffloadPoint>", into = "Vec<ConnectOffloadPoint>")]
pub struct ConnectExecutionStrategy {
    bits: u8,
}

impl ConnectExecutionStrategy {
    #[inline]
    pub const fn offload_none() -> Self {
        Self { bits: 0 }
    }

    #[inline]
    pub const fn offload_all() -> Self {
        Self {
            bits: ConnectOffloadPoint::Connect.bit() | ConnectOffloadPoint::Close.bit(),
        }
    }

    #[inline]
    pub const fn offload_only(point: ConnectOffloadPoint) -> Self {
        Self { bits: point.bit() }
    }

    #[inline]
    #[must_use]
    pub const fn with(self, point: ConnectOffloadPoint) -> Self {
        Self {
            bits: self.bits | point.bit(),
        }
    }

    #[inline]
    pub const fn is_offloaded(self, point: ConnectOffloadPoint) -> bool {
        self.bits & point.bit() != 0
    }

    #[inline]
    pub const fn is_connect_offloaded(self) -> bool {
        self.is_offloaded(ConnectOffloadPoint::Connect)
    }

    #[inline]
    pub const fn is_close_offloaded(self) -> bool {
        self.is_offloaded(ConnectOffloadPoint::Close)
    }

    #[inline]
    pub const fn has_offloads(self) -> bool {
        self.bits != 0
    }

    #[inline]
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    pub fn iter(self) -> impl Iterator<Item = ConnectOffloadPoint> {
        ConnectOffloadPoint::ALL
            .into_iter()
            .filter(move |point| self.is_offloaded(*point))
    }
}

impl From<Vec<ConnectOffloadPoint>> for ConnectExecutionStrategy {
    fn from(points: Vec<ConnectOffloadPoint>) -> Self {
        points.into_iter().fold(Self::offload_none(), Self::with)
    }
}

impl From<ConnectExecutionStrategy> for Vec<ConnectOffloadPoint> {
    fn from(strategy: ConnectExecutionStrategy) -> Self {
        strategy.iter().collect()
    }
}

impl fmt::Debug for ConnectExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for ConnectExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_offloads() {
            return f.write_str("none");
        }
        for (index, point) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            f.write_str(point.as_str())?;
        }
        Ok(())
    }
}

/// 连接工厂的组合策略：连接阶段与 HTTP 阶段各自的需求。
///
/// ## 契约定义（What）
/// - `http` 为 [`ExecutionStrategy::Default`] 表示连接工厂未对 HTTP 阶段提出具体要求；
/// - 配置中写作表 `{ connect = [...], http = ... }`，缺省字段分别取 `[]` 与 `"default"`。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectAndHttpExecutionStrategy {
    connect: ConnectExecutionStrategy,
    http: ExecutionStrategy,
}

impl ConnectAndHttpExecutionStrategy {
    pub const fn new(connect: ConnectExecutionStrategy, http: ExecutionStrategy) -> Self {
        Self { connect, http }
    }

    #[inline]
    pub const fn connect(self) -> ConnectExecutionStrategy {
        self.connect
    }

    #[inline]
    pub const fn http(self) -> ExecutionStrategy {
        self.http
    }

    /// 任一阶段需要卸载即为真。
    #[inline]
    pub const fn has_offloads(self) -> bool {
        self.connect.has_offloads() || self.http.has_offloads()
    }

    /// 把任意形态的策略并入对应阶段。
    #[must_use]
    pub const fn merge(self, other: AnyExecutionStrategy) -> Self {
        match other {
            AnyExecutionStrategy::Connect(connect) => Self {
                connect: self.connect.merge(connect),
                http: self.http,
            },
            AnyExecutionStrategy::Http(http) => Self {
                connect: self.connect,
                http: self.http.merge(http),
            },
            AnyExecutionStrategy::ConnectAndHttp(both) => Self {
                connect: self.connect.merge(both.connect),
                http: self.http.merge(both.http),
            },
        }
    }
}

/// 单阶段声明补全为组合形态：缺失的连接阶段取“不卸载”，缺失的 HTTP 阶段取“默认”。
impl From<AnyExecutionStrategy> for ConnectAndHttpExecutionStrategy {
    fn from(strategy: AnyExecutionStrategy) -> Self {
        match strategy {
            AnyExecutionStrategy::Connect(connect) => Self::new(connect, ExecutionStrategy::Default),
            AnyExecutionStrategy::Http(http) => Self::new(ConnectExecutionStrategy::offload_none(), http),
            AnyExecutionStrategy::ConnectAndHttp(both) => both,
        }
    }
}

impl fmt::Display for ConnectAndHttpExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connect({}) http({})", self.connect, self.http)
    }
}

/// 连接工厂过滤器可以声明的策略形态。
///
/// 配置中以外部标签区分，例如 `{ connect = ["connect"] }`、`{ http = "all" }`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnyExecutionStrategy {
    Connect(ConnectExecutionStrategy),
    Http(ExecutionStrategy),
    ConnectAndHttp(ConnectAndHttpExecutionStrategy),
}

impl AnyExecutionStrategy {
    /// 不卸载任何阶段。
    #[inline]
    pub const fn offload_none() -> Self {
        Self::Http(ExecutionStrategy::offload_none())
    }

    #[inline]
    pub const fn has_offloads(self) -> bool {
        match self {
            Self::Connect(connect) => connect.has_offloads(),
            Self::Http(http) => http.has_offloads(),
            Self::ConnectAndHttp(both) => both.has_offloads(),
        }
    }

    /// HTTP 阶段是否声明了“从不卸载”，无论以单阶段还是组合形态给出。
    #[inline]
    pub const fn is_never(self) -> bool {
        match self {
            Self::Connect(_) => false,
            Self::Http(http) => http.is_never(),
            Self::ConnectAndHttp(both) => both.http.is_never(),
        }
    }

    /// 把 HTTP 阶段的 `never` 换成 `none`，连接阶段原样保留。
    #[inline]
    #[must_use]
    pub const fn without_never(self) -> Self {
        match self {
            Self::Http(ExecutionStrategy::Never) => Self::offload_none(),
            Self::ConnectAndHttp(both) if both.http.is_never() => Self::ConnectAndHttp(
                ConnectAndHttpExecutionStrategy::new(both.connect, ExecutionStrategy::offload_none()),
            ),
            other => other,
        }
    }

    /// 提取与 HTTP 阶段相关的部分。
    ///
    /// 纯连接阶段策略只有“关闭”与 HTTP 阶段对应，映射为 [`OffloadPoint::Close`]。
    pub const fn http_component(self) -> ExecutionStrategy {
        match self {
            Self::Connect(connect) if connect.is_close_offloaded() => {
                ExecutionStrategy::offload_only(OffloadPoint::Close)
            }
            Self::Connect(_) => ExecutionStrategy::offload_none(),
            Self::Http(http) => http,
            Self::ConnectAndHttp(both) => both.http,
        }
    }
}

impl From<ConnectExecutionStrategy> for AnyExecutionStrategy {
    fn from(strategy: ConnectExecutionStrategy) -> Self {
        Self::Connect(strategy)
    }
}

impl From<ExecutionStrategy> for AnyExecutionStrategy {
    fn from(strategy: ExecutionStrategy) -> Self {
        Self::Http(strategy)
    }
}

impl From<ConnectAndHttpExecutionStrategy> for AnyExecutionStrategy {
    fn from(strategy: ConnectAndHttpExecutionStrategy) -> Self {
        Self::ConnectAndHttp(strategy)
    }
}

impl From<AnyExecutionStrategy> for ExecutionStrategy {
    fn from(strategy: AnyExecutionStrategy) -> Self {
        strategy.http_component()
    }
}

impl fmt::Display for AnyExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(connect) => write!(f, "connect({connect})"),
            Self::Http(http) => write!(f, "http({http})"),
            Self::ConnectAndHttp(both) => fmt::Display::fmt(both, f),
        }
    }
}
