//! History Repository Port - 出站端口
//!
//! 定义生成历史持久化的抽象接口
//! 具体实现在 infrastructure 层（SQLite）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::history::{HistoryRecord, NewHistoryRecord};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// History Repository Port
///
/// 只追加的历史日志：
/// - `append` 返回前必须已持久化
/// - 序号按分配顺序从 1 递增，不复用
/// - `list` 按时间正序（最旧在前）
#[async_trait]
pub trait HistoryRepositoryPort: Send + Sync {
    /// 追加记录，返回分配了序号的完整记录
    async fn append(&self, record: NewHistoryRecord) -> Result<HistoryRecord, RepositoryError>;

    /// 全部记录，最旧在前
    async fn list(&self) -> Result<Vec<HistoryRecord>, RepositoryError>;

    /// 按序号获取
    async fn get(&self, index: u64) -> Result<Option<HistoryRecord>, RepositoryError>;

    /// 记录总数
    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.list().await?.len() as u64)
    }

    /// 最新一条记录
    async fn latest(&self) -> Result<Option<HistoryRecord>, RepositoryError> {
        Ok(self.list().await?.pop())
    }
}
