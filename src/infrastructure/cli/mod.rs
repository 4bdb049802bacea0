//! 命令行入口
//!
//! - args: clap 参数定义
//! - runner: 适配器组装与子命令执行
//! - render: 终端输出格式化

pub mod args;
pub mod render;
pub mod runner;

pub use args::{Cli, Commands, GenerateArgs, HistoryAction};
pub use runner::{run, run_background, run_init, App};
