//! Generation Context - Entities

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{AudioSpec, OutputFormat};

/// 生成产物
///
/// 一次成功生成只产生一个产物；写入磁盘后以只读引用交给
/// History Store 和播放适配器。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedArtifact {
    /// 已落盘的产物路径
    pub path: PathBuf,
    pub format: OutputFormat,
    /// 编码前的 PCM 格式
    pub spec: AudioSpec,
    /// PCM 数据字节数（不含文件头）
    pub pcm_bytes: u64,
    /// 实际采集时长
    pub actual_duration: Duration,
    /// 消费的片段数
    pub chunk_count: u64,
}

impl GeneratedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn actual_duration_ms(&self) -> u64 {
        self.actual_duration.as_millis() as u64
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
