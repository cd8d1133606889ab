#![deny(unsafe_code)]

//! `spark-execution` 描述客户端流水线各阶段的卸载需求，并把它们合成为有效执行策略。
//!
//! # 模块定位（Why）
//! - 传输层与客户端装配代码需要逐个卸载点决定“派发到工作线程”还是“在 I/O 线程内联执行”；
//! - 每个组件只声明自身需求，由本 crate 负责合并，保证任一组件都不能单方面关闭整条流水线的卸载。
//!
//! # 设计概要（How）
//! - `strategy` 定义策略值类型与半格合并，并提供文本与 `serde` 形式，便于从配置文件读取；
//! - `influencer` 定义组件声明需求的 trait；
//! - `chain` 按组件角色累积需求，产出客户端与连接工厂的有效策略。
//!
//! # 命名约定（Consistency）
//! - 卸载点名称统一使用 snake_case（`receive_data`），日志字段与配置键保持一致。

pub mod chain;
pub mod error;
pub mod influencer;
pub mod strategy;

pub use chain::ClientStrategyChainBuilder;
pub use error::StrategyParseError;
pub use influencer::{DeclaredOffloads, ExecutionStrategyInfluencer, Purpose};
pub use strategy::{
    AnyExecutionStrategy, ConnectAndHttpExecutionStrategy, ConnectExecutionStrategy,
    ConnectOffloadPoint, ExecutionStrategy, ExecutionStrategyBuilder, OffloadPoint, OffloadPoints,
};
