//! History Queries

/// 列出全部历史记录（最旧在前）
#[derive(Debug, Clone, Default)]
pub struct ListHistory;

/// 按序号获取历史记录
#[derive(Debug, Clone)]
pub struct GetHistoryItem {
    pub index: u64,
}
