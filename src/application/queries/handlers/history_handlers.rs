//! History Query Handlers

use serde::Serialize;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{ArtifactStoragePort, HistoryRepositoryPort};
use crate::application::queries::{GetHistoryItem, ListHistory};
use crate::domain::history::HistoryRecord;

/// 历史条目视图
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: HistoryRecord,
    /// 产物文件是否仍在磁盘上
    pub artifact_exists: bool,
}

/// ListHistory Handler
pub struct ListHistoryHandler {
    history_repo: Arc<dyn HistoryRepositoryPort>,
    storage: Arc<dyn ArtifactStoragePort>,
}

impl ListHistoryHandler {
    pub fn new(
        history_repo: Arc<dyn HistoryRepositoryPort>,
        storage: Arc<dyn ArtifactStoragePort>,
    ) -> Self {
        Self {
            history_repo,
            storage,
        }
    }

    pub async fn handle(&self, _query: ListHistory) -> Result<Vec<HistoryEntry>, ApplicationError> {
        let records = self.history_repo.list().await?;

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let artifact_exists = self.storage.exists(record.output_path()).await;
            entries.push(HistoryEntry {
                record,
                artifact_exists,
            });
        }

        Ok(entries)
    }
}

/// GetHistoryItem Handler
pub struct GetHistoryItemHandler {
    history_repo: Arc<dyn HistoryRepositoryPort>,
    storage: Arc<dyn ArtifactStoragePort>,
}

impl GetHistoryItemHandler {
    pub fn new(
        history_repo: Arc<dyn HistoryRepositoryPort>,
        storage: Arc<dyn ArtifactStoragePort>,
    ) -> Self {
        Self {
            history_repo,
            storage,
        }
    }

    pub async fn handle(&self, query: GetHistoryItem) -> Result<HistoryEntry, ApplicationError> {
        let record = self
            .history_repo
            .get(query.index)
            .await?
            .ok_or_else(|| ApplicationError::not_found("History item", query.index))?;

        let artifact_exists = self.storage.exists(record.output_path()).await;
        Ok(HistoryEntry {
            record,
            artifact_exists,
        })
    }
}
