//! Generation Context - Errors

use thiserror::Error;

/// 生成请求校验错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("duration must be a positive number of seconds, got {0}")]
    InvalidDuration(u32),

    #[error("duration {secs}s exceeds the WAV size limit of {max}s")]
    DurationTooLong { secs: u32, max: u32 },

    #[error("bpm must be positive, got {0}")]
    InvalidBpm(u32),

    #[error("temperature must be between {min} and {max}, got {value}")]
    InvalidTemperature { value: f32, min: f32, max: f32 },

    #[error("unsupported output format '{0}' (expected wav or mp3)")]
    UnsupportedFormat(String),
}
