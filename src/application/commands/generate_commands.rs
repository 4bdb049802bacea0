//! Generate Commands - 生成相关命令

use std::path::PathBuf;

use crate::domain::generation::{GeneratedArtifact, OutputFormat};
use crate::domain::history::HistoryRecord;

/// 产物输出位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// 在输出目录下按 prompt 和时间戳自动命名
    Auto,
    /// 用户指定路径
    Path(PathBuf),
    /// 临时文件：播放后删除，不写历史
    Temporary,
}

impl OutputTarget {
    pub fn is_temporary(&self) -> bool {
        matches!(self, OutputTarget::Temporary)
    }
}

/// 生成音乐命令
#[derive(Debug, Clone)]
pub struct GenerateMusicCommand {
    pub prompt: String,
    pub duration_secs: u32,
    pub bpm: u32,
    pub seed: Option<u32>,
    pub temperature: Option<f32>,
    pub style: Option<String>,
    pub output: OutputTarget,
    pub format: OutputFormat,
    pub play: bool,
    /// 生成前用文本模型改写 prompt
    pub optimize: bool,
}

/// 重新生成历史记录命令
///
/// 按历史记录中保存的请求参数原样重新提交
#[derive(Debug, Clone)]
pub struct RerunGenerationCommand {
    pub index: u64,
    pub output: OutputTarget,
    /// None 时沿用原产物的格式
    pub format: Option<OutputFormat>,
    pub play: bool,
}

/// 生成响应
#[derive(Debug, Clone)]
pub struct GenerateMusicResponse {
    pub artifact: GeneratedArtifact,
    /// 临时模式下为 None
    pub record: Option<HistoryRecord>,
    /// 建立会话时的重试次数
    pub retries: u32,
    /// 播放失败不影响已写入的历史记录，只在这里报告
    pub playback_error: Option<String>,
}
