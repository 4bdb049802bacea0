//! gen-music - 基于 Lyria RealTime 的文本生成音乐命令行工具
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Generation Context: 生成请求、音频格式、产物
//! - History Context: 历史记录
//! - 文件命名规则
//!
//! 应用层 (application/):
//! - Ports: MusicEngine, ArtifactStorage, AudioEncoder, HistoryRepository, AudioPlayer, PromptAssistant
//! - Services: 会话建立（含重试）、片段拼接
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: Lyria WebSocket 客户端、离线音调引擎、WAV 存储、ffmpeg 编码、外部播放器、Gemini
//! - Persistence: SQLite 历史库
//! - CLI: clap 参数与子命令执行

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
