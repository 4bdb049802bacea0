//! History Context - Entities

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::domain::generation::{GeneratedArtifact, GenerationRequest};

/// 待追加的历史记录（尚未分配序号）
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryRecord {
    pub created_at: DateTime<Utc>,
    pub request: GenerationRequest,
    /// `--optimize` 改写前的原始 prompt
    pub source_prompt: Option<String>,
    pub output_path: PathBuf,
    pub captured_ms: u64,
}

impl NewHistoryRecord {
    /// 由已落盘的产物构造
    pub fn from_artifact(
        request: GenerationRequest,
        source_prompt: Option<String>,
        artifact: &GeneratedArtifact,
    ) -> Self {
        Self {
            created_at: Utc::now(),
            request,
            source_prompt,
            output_path: artifact.path.clone(),
            captured_ms: artifact.actual_duration_ms(),
        }
    }
}

/// 历史记录
///
/// 不变量:
/// - index 从 1 开始，按分配顺序递增，跨进程稳定
/// - 被删除的序号不会再次分配
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub index: u64,
    pub created_at: DateTime<Utc>,
    pub request: GenerationRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_prompt: Option<String>,
    pub output_path: PathBuf,
    pub captured_ms: u64,
}

impl HistoryRecord {
    pub fn from_new(index: u64, record: NewHistoryRecord) -> Self {
        Self {
            index,
            created_at: record.created_at,
            request: record.request,
            source_prompt: record.source_prompt,
            output_path: record.output_path,
            captured_ms: record.captured_ms,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// 用户最初输入的 prompt
    pub fn display_prompt(&self) -> &str {
        self.source_prompt
            .as_deref()
            .unwrap_or_else(|| self.request.prompt())
    }
}
