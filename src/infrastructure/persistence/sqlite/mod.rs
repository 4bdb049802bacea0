//! SQLite Persistence - 生成历史持久化

mod database;
mod history_repo;

pub use database::*;
pub use history_repo::*;
