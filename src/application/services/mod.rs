//! 应用服务 - 会话编排核心
//!
//! - generation_client: 会话建立与连接重试
//! - stream_assembler: 时长预算下的片段拼接与落盘

mod generation_client;
mod stream_assembler;

pub use generation_client::{GenerationClient, GenerationClientConfig, GenerationStream};
pub use stream_assembler::{CapturedAudio, RunLimits, StopReason, StreamAssembler};
