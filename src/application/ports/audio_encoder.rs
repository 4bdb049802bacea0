//! Audio Encoder Port - WAV 转其他格式

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::domain::generation::OutputFormat;

/// 编码错误
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("Encoder unavailable: {0}")]
    Unavailable(String),

    #[error("Encoding failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Audio Encoder Port
///
/// `encode` 与存储端口一样要求原子写入：失败时 `output` 保持原状
#[async_trait]
pub trait AudioEncoderPort: Send + Sync {
    /// 生成开始前检查编码器可用，避免生成完才发现无法转换
    async fn ensure_available(&self, format: OutputFormat) -> Result<(), EncoderError>;

    async fn encode(
        &self,
        wav: &Path,
        output: &Path,
        format: OutputFormat,
    ) -> Result<(), EncoderError>;
}
