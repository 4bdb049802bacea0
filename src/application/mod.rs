//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（MusicEngine、ArtifactStorage、AudioEncoder、HistoryRepository、AudioPlayer、PromptAssistant）
//! - services: 会话建立与片段拼接
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use commands::{
    GenerateMusicCommand,
    GenerateMusicResponse,
    OutputTarget,
    ReplayHistoryItem,
    RerunGenerationCommand,
    // Handlers
    handlers::{
        GenerateMusicHandler, GenerateMusicHandlerConfig, ReplayHistoryHandler,
        RerunGenerationHandler,
    },
};

pub use error::ApplicationError;

pub use ports::{
    // Artifact storage
    ArtifactStorageError,
    ArtifactStoragePort,
    // Encoding
    AudioEncoderPort,
    EncoderError,
    // Playback
    AudioPlayerPort,
    PlaybackError,
    // History
    HistoryRepositoryPort,
    RepositoryError,
    // Engine
    ChunkStream,
    EngineError,
    MusicEnginePort,
    // Prompt assistant
    AssistantError,
    PromptAssistantPort,
};

pub use queries::{
    GetHistoryItem,
    ListHistory,
    // Handlers
    handlers::{GetHistoryItemHandler, HistoryEntry, ListHistoryHandler},
};

pub use services::{GenerationClient, GenerationClientConfig, RunLimits, StreamAssembler};
