//! Artifact Storage Port - 出站端口
//!
//! 定义生成产物文件存储的抽象接口

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::generation::{AudioSpec, OutputFormat};

/// 产物存储错误
#[derive(Debug, Error)]
pub enum ArtifactStorageError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Audio too large for WAV container: {0} bytes")]
    TooLarge(u64),
}

/// Artifact Storage Port - 出站端口
///
/// 写入必须是原子的：要么完整文件出现在目标路径，要么什么都不留下。
#[async_trait]
pub trait ArtifactStoragePort: Send + Sync {
    /// 为新产物分配并占用一个不冲突的路径
    ///
    /// 返回时路径上已存在一个空的占位文件，并发调用不会拿到同一路径。
    /// 生成失败时调用方负责 `delete` 释放占位。
    async fn allocate_path(
        &self,
        prompt: &str,
        format: OutputFormat,
    ) -> Result<PathBuf, ArtifactStorageError>;

    /// 将 PCM 数据以 WAV 格式写入目标路径
    ///
    /// 返回写入的总字节数（含文件头）
    async fn write_wav(
        &self,
        path: &Path,
        spec: AudioSpec,
        pcm: &[u8],
    ) -> Result<u64, ArtifactStorageError>;

    /// 删除产物（不存在时视为成功）
    async fn delete(&self, path: &Path) -> Result<(), ArtifactStorageError>;

    /// 检查产物是否存在
    async fn exists(&self, path: &Path) -> bool;
}
