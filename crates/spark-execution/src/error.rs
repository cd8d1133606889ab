//! 执行策略配置解析错误。
//!
//! 策略合成本身只在内存值上运算，没有失败路径；错误只出现在把外部文本（TOML、命令行参数）
//! 解析为卸载点名称的边界上。

use thiserror::Error;

/// 卸载点或执行策略文本无法识别。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StrategyParseError {
    /// 不是已知的 HTTP 卸载点名称。
    #[error("unknown offload point `{name}`, expected one of: send, receive_metadata, receive_data, event, close")]
    UnknownOffloadPoint { name: String },

    /// 不是已知的连接阶段卸载点名称。
    #[error("unknown connect offload point `{name}`, expected one of: connect, close")]
    UnknownConnectOffloadPoint { name: String },

    /// 策略文本为空；“不卸载”须显式写作 `none`。
    #[error("empty execution strategy, use `none` to request no offloading")]
    Empty,
}
