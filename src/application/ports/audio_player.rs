//! Audio Player Port - 播放适配器抽象

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// 播放错误
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("No audio player available: {0}")]
    PlayerUnavailable(String),

    #[error("Player failed: {0}")]
    PlayerFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Audio Player Port
///
/// 同步播放：返回时播放已结束
#[async_trait]
pub trait AudioPlayerPort: Send + Sync {
    async fn play(&self, path: &Path) -> Result<(), PlaybackError>;
}
