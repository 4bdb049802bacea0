//! Configuration Module
//!
//! 提供应用配置管理功能，支持多层级配置来源：
//! - 环境变量（最高优先级）
//! - `.env` 文件（只提供通用环境变量）
//! - 配置文件（TOML 格式，用户级与项目级）
//! - 默认值（最低优先级）

mod loader;
mod template;
mod types;

pub use loader::{
    load_config, load_config_from, print_config, user_config_path, validate_config,
    ConfigError, ConfigSources,
};
pub use template::{write_template, InitOutcome};
pub use types::{
    app_config_dir, AppConfig, AssistantConfig, EncoderConfig, EngineConfig, EngineKind,
    GenerationConfig, GoogleConfig, LogConfig, PlaybackConfig, StorageConfig,
};
