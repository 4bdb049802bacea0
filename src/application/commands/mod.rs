//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：生成、重新生成、重放

mod generate_commands;
mod history_commands;

pub mod handlers;

pub use generate_commands::*;
pub use history_commands::*;
