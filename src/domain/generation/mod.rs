//! Generation Context - 音乐生成限界上下文
//!
//! 职责:
//! - 生成请求的校验与不可变表示
//! - 音频流片段与音频格式
//! - 生成产物（已落盘的音频文件）

mod entities;
mod errors;
mod value_objects;

pub use entities::GeneratedArtifact;
pub use errors::RequestError;
pub use value_objects::{
    AudioChunk, AudioSpec, GenerationRequest, OutputFormat, DEFAULT_BPM, MAX_TEMPERATURE,
    MIN_TEMPERATURE,
};
