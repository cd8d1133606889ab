//! 测试替身：手动驱动的单值源与记录信号的订阅者。
//!
//! 默认随 `test-util` 特性开放，下游 crate 可以在自己的测试中复用。

mod subscriber;
mod test_single;

pub use subscriber::{ProtocolViolation, Terminal, TestSingleSubscriber};
pub use test_single::{TestSingle, TestSingleBuilder};
