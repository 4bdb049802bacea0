//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod artifact_storage;
mod audio_encoder;
mod audio_player;
mod history_repository;
mod music_engine;
mod prompt_assistant;

pub use artifact_storage::{ArtifactStorageError, ArtifactStoragePort};
pub use audio_encoder::{AudioEncoderPort, EncoderError};
pub use audio_player::{AudioPlayerPort, PlaybackError};
pub use history_repository::{HistoryRepositoryPort, RepositoryError};
pub use music_engine::{ChunkStream, EngineError, MusicEnginePort};
pub use prompt_assistant::{AssistantError, PromptAssistantPort};
