//! Replay Handler - 重放历史产物

use std::sync::Arc;

use crate::application::commands::ReplayHistoryItem;
use crate::application::error::ApplicationError;
use crate::application::ports::{ArtifactStoragePort, AudioPlayerPort, HistoryRepositoryPort};
use crate::domain::history::HistoryRecord;

/// ReplayHistoryItem Handler
///
/// 只播放已有产物，不触发生成，也不修改历史
pub struct ReplayHistoryHandler {
    history_repo: Arc<dyn HistoryRepositoryPort>,
    storage: Arc<dyn ArtifactStoragePort>,
    player: Arc<dyn AudioPlayerPort>,
}

impl ReplayHistoryHandler {
    pub fn new(
        history_repo: Arc<dyn HistoryRepositoryPort>,
        storage: Arc<dyn ArtifactStoragePort>,
        player: Arc<dyn AudioPlayerPort>,
    ) -> Self {
        Self {
            history_repo,
            storage,
            player,
        }
    }

    pub async fn handle(&self, cmd: ReplayHistoryItem) -> Result<HistoryRecord, ApplicationError> {
        let record = self
            .history_repo
            .get(cmd.index)
            .await?
            .ok_or_else(|| ApplicationError::not_found("History item", cmd.index))?;

        if !self.storage.exists(record.output_path()).await {
            return Err(ApplicationError::ArtifactMissing {
                index: record.index,
                path: record.output_path.clone(),
            });
        }

        tracing::info!(index = record.index, path = %record.output_path.display(), "Replaying");
        self.player.play(record.output_path()).await?;

        Ok(record)
    }
}
