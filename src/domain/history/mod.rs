//! History Context - 生成历史限界上下文
//!
//! 职责:
//! - 历史记录实体（序号、时间、请求参数、产物路径）
//! - 序号只追加、永不复用

mod entities;

pub use entities::{HistoryRecord, NewHistoryRecord};
