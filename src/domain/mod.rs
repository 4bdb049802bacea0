//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Generation Context: 生成请求、音频片段、生成产物
//! - History Context: 生成历史记录

pub mod generation;
pub mod history;

// 共享的产物文件命名
mod file_naming;

pub use file_naming::{artifact_file_name, slugify, NamingConfig, FALLBACK_SLUG};
