//! History Commands - 历史记录相关命令

/// 重放历史记录中的产物
#[derive(Debug, Clone)]
pub struct ReplayHistoryItem {
    pub index: u64,
}
