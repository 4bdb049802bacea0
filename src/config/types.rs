//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::generation::OutputFormat;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Google / Lyria 凭据与模型
    #[serde(default)]
    pub google: GoogleConfig,

    /// 生成引擎选择
    #[serde(default)]
    pub engine: EngineConfig,

    /// 生成参数默认值
    #[serde(default)]
    pub generation: GenerationConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 播放配置
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// 格式转换配置
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// prompt 改写配置
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// Google 配置
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    /// Google Cloud 项目（Vertex AI 模式）
    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Google AI API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// OAuth access token（Vertex AI 模式）
    #[serde(default)]
    pub access_token: Option<String>,

    /// 覆盖默认的 WebSocket 端点
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_model_id() -> String {
    "models/lyria-realtime-exp".to_string()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: default_location(),
            model_id: default_model_id(),
            api_key: None,
            access_token: None,
            endpoint: None,
        }
    }
}

/// 引擎类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Lyria RealTime（需要网络和凭据）
    #[default]
    Lyria,
    /// 离线正弦音
    Tone,
}

/// 引擎配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub kind: EngineKind,
}

/// 生成配置
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_duration")]
    pub default_duration_secs: u32,

    #[serde(default = "default_bpm")]
    pub default_bpm: u32,

    /// 请求未指定时使用的 temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// 整体生成超时（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// 连接重试前的等待（毫秒）
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// 未指定 `--format` 时的输出格式
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_duration() -> u32 {
    10
}

fn default_bpm() -> u32 {
    120
}

fn default_temperature() -> f32 {
    1.0
}

fn default_timeout() -> u64 {
    120
}

fn default_retry_backoff() -> u64 {
    500
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: default_duration(),
            default_bpm: default_bpm(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
            retry_backoff_ms: default_retry_backoff(),
            format: OutputFormat::default(),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 产物输出目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// 历史数据库路径
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

/// `~/.config/gen-music`
pub fn app_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("gen-music")
}

pub(crate) fn default_output_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Music"))
        .unwrap_or_else(|| PathBuf::from("Music"))
}

pub(crate) fn default_history_path() -> PathBuf {
    app_config_dir().join("history.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            history_path: default_history_path(),
        }
    }
}

/// 播放配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaybackConfig {
    /// 播放程序，未设置时自动探测
    #[serde(default)]
    pub player: Option<String>,
}

/// 格式转换配置
#[derive(Debug, Clone, Deserialize)]
pub struct EncoderConfig {
    /// ffmpeg 可执行文件名或路径
    #[serde(default = "default_encoder_program")]
    pub program: String,
}

fn default_encoder_program() -> String {
    "ffmpeg".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: default_encoder_program(),
        }
    }
}

/// prompt 改写配置
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_model")]
    pub model: String,

    #[serde(default = "default_assistant_base_url")]
    pub base_url: String,
}

fn default_assistant_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_assistant_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: default_assistant_model(),
            base_url: default_assistant_base_url(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.google.location, "us-central1");
        assert_eq!(config.google.model_id, "models/lyria-realtime-exp");
        assert_eq!(config.engine.kind, EngineKind::Lyria);
        assert_eq!(config.generation.default_bpm, 120);
        assert_eq!(config.generation.timeout_secs, 120);
        assert_eq!(config.generation.format, OutputFormat::Wav);
        assert_eq!(config.encoder.program, "ffmpeg");
        assert!(config.storage.history_path.ends_with("gen-music/history.db"));
        assert_eq!(config.log.level, "warn");
    }
}
