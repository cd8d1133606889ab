use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::StrategyParseError;

/// HTTP 层操作中可以被调度到工作线程执行的阶段。
///
/// ## 设计目的（Why）
/// - 组件只在真正会阻塞的阶段请求卸载；以阶段为粒度表达需求，避免“全有或全无”的粗放策略。
///
/// ## 契约定义（What）
/// - 每个卸载点有稳定的 snake_case 名称，用于日志与配置文件；
/// - 名称与枚举值一一对应，[`OffloadPoint::parse`] 与 [`OffloadPoint::as_str`] 互逆。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffloadPoint {
    /// 写出请求。
    Send,
    /// 接收响应元数据（状态行与头部）。
    ReceiveMetadata,
    /// 接收响应负载数据。
    ReceiveData,
    /// 事件回调（如连接状态变化）。
    Event,
    /// 关闭资源。
    Close,
}

impl OffloadPoint {
    /// 全部卸载点，按位序排列。
    pub const ALL: [OffloadPoint; 5] = [
        OffloadPoint::Send,
        OffloadPoint::ReceiveMetadata,
        OffloadPoint::ReceiveData,
        OffloadPoint::Event,
        OffloadPoint::Close,
    ];

    #[inline]
    const fn bit(self) -> u8 {
        match self {
            Self::Send => 1 << 0,
            Self::ReceiveMetadata => 1 << 1,
            Self::ReceiveData => 1 << 2,
            Self::Event => 1 << 3,
            Self::Close => 1 << 4,
        }
    }

    /// 返回稳定名称。
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::ReceiveMetadata => "receive_metadata",
            Self::ReceiveData => "receive_data",
            Self::Event => "event",
            Self::Close => "close",
        }
    }

    /// 根据稳定名称解析卸载点。
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "send" => Some(Self::Send),
            "receive_metadata" => Some(Self::ReceiveMetadata),
            "receive_data" => Some(Self::ReceiveData),
            "event" => Some(Self::Event),
            "close" => Some(Self::Close),
            _ => None,
        }
    }
}

impl fmt::Display for OffloadPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OffloadPoint {
    type Err = StrategyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| StrategyParseError::UnknownOffloadPoint {
            name: value.to_owned(),
        })
    }
}

/// 卸载点集合，以位图存储。
///
/// 并集、包含判断都是单条位运算；空集表示“不卸载任何阶段”。
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OffloadPoints {
    bits: u8,
}

impl OffloadPoints {
    const MASK: u8 = 0b1_1111;

    /// 空集。
    #[inline]
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// 全集。
    #[inline]
    pub const fn all() -> Self {
        Self { bits: Self::MASK }
    }

    /// 从位图构造，忽略未定义的高位。
    #[inline]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self {
            bits: bits & Self::MASK,
        }
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.bits
    }

    /// 加入一个卸载点。
    #[inline]
    #[must_use]
    pub const fn with(self, point: OffloadPoint) -> Self {
        Self {
            bits: self.bits | point.bit(),
        }
    }

    #[inline]
    pub const fn contains(self, point: OffloadPoint) -> bool {
        self.bits & point.bit() != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    #[inline]
    pub const fn is_all(self) -> bool {
        self.bits == Self::MASK
    }

    /// 集合并。
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// `self` 是否被 `other` 包含。
    #[inline]
    pub const fn is_subset(self, other: Self) -> bool {
        self.bits & !other.bits == 0
    }

    /// 按位序遍历包含的卸载点。
    pub fn iter(self) -> impl Iterator<Item = OffloadPoint> {
        OffloadPoint::ALL
            .into_iter()
            .filter(move |point| self.contains(*point))
    }
}

impl FromIterator<OffloadPoint> for OffloadPoints {
    fn from_iter<I: IntoIterator<Item = OffloadPoint>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl From<OffloadPoint> for OffloadPoints {
    fn from(point: OffloadPoint) -> Self {
        Self::empty().with(point)
    }
}

impl fmt::Debug for OffloadPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// 以逗号连接名称；空集写作 `none`。
impl fmt::Display for OffloadPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
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
