//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 通用环境变量 PROJECT_ID / LOCATION / MODEL_ID / GOOGLE_API_KEY / GOOGLE_ACCESS_TOKEN，
//!    进程环境未设置时取 `.env` 文件（./.env 覆盖 ~/.config/gen-music/.env）
//! 2. 环境变量（前缀 `GEN_MUSIC_`，层级分隔符 `__`）
//! 3. `--config` 指定的文件，或当前目录的 gen-music.toml
//! 4. ~/.config/gen-music/config.toml
//! 5. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::types::{app_config_dir, default_history_path, default_output_dir, AppConfig};
use crate::domain::generation::{MAX_TEMPERATURE, MIN_TEMPERATURE};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to write configuration: {0}")]
    WriteError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 环境变量前缀
const ENV_PREFIX: &str = "GEN_MUSIC";

/// 当前目录下的配置文件
const LOCAL_CONFIG_FILE: &str = "gen-music.toml";

const DOTENV_FILE: &str = ".env";

/// 不带前缀的通用环境变量及其对应的配置键
const WELL_KNOWN_ENV: &[(&str, &str)] = &[
    ("PROJECT_ID", "google.project_id"),
    ("LOCATION", "google.location"),
    ("MODEL_ID", "google.model_id"),
    ("GOOGLE_API_KEY", "google.api_key"),
    ("GOOGLE_ACCESS_TOKEN", "google.access_token"),
];

/// 用户级配置文件路径
pub fn user_config_path() -> PathBuf {
    app_config_dir().join("config.toml")
}

/// 配置来源
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// 用户级配置文件（可选存在）
    pub user_file: Option<PathBuf>,
    /// 项目级配置文件（可选存在）
    pub local_file: Option<PathBuf>,
    /// `--config` 指定的文件（必须存在，替代项目级文件）
    pub explicit_file: Option<PathBuf>,
    /// 环境变量；None 表示读取进程环境
    pub env: Option<config::Map<String, String>>,
    /// `.env` 文件，靠后的覆盖靠前的；不存在的跳过
    pub dotenv_files: Vec<PathBuf>,
}

impl ConfigSources {
    /// 标准搜索路径
    pub fn standard(explicit_file: Option<&Path>) -> Self {
        Self {
            user_file: Some(user_config_path()),
            local_file: Some(PathBuf::from(LOCAL_CONFIG_FILE)),
            explicit_file: explicit_file.map(Path::to_path_buf),
            env: None,
            dotenv_files: vec![
                app_config_dir().join(DOTENV_FILE),
                PathBuf::from(DOTENV_FILE),
            ],
        }
    }

    fn lookup_env(&self, name: &str) -> Option<String> {
        let value = match &self.env {
            Some(env) => env.get(name).cloned(),
            None => std::env::var(name).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

/// 读取 `.env` 文件中的键值
fn read_dotenv_files(files: &[PathBuf]) -> Result<HashMap<String, String>, ConfigError> {
    let mut values = HashMap::new();
    for path in files.iter().filter(|p| p.is_file()) {
        let entries = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;
        for entry in entries {
            let (key, value) = entry
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
            values.insert(key, value);
        }
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }
    Ok(values)
}

/// 加载应用配置
///
/// # 环境变量示例
/// - `GEN_MUSIC_ENGINE__KIND=tone`
/// - `GEN_MUSIC_GENERATION__TIMEOUT_SECS=60`
/// - `GEN_MUSIC_STORAGE__OUTPUT_DIR=/data/music`
/// - `GOOGLE_API_KEY=...`
pub fn load_config(explicit_file: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_config_from(ConfigSources::standard(explicit_file))
}

/// 从指定来源加载配置
pub fn load_config_from(sources: ConfigSources) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("google.location", "us-central1")?
        .set_default("google.model_id", "models/lyria-realtime-exp")?
        .set_default("engine.kind", "lyria")?
        .set_default("generation.default_duration_secs", 10)?
        .set_default("generation.default_bpm", 120)?
        .set_default("generation.temperature", 1.0)?
        .set_default("generation.timeout_secs", 120)?
        .set_default("generation.retry_backoff_ms", 500)?
        .set_default("generation.format", "wav")?
        .set_default(
            "storage.output_dir",
            default_output_dir().to_string_lossy().to_string(),
        )?
        .set_default(
            "storage.history_path",
            default_history_path().to_string_lossy().to_string(),
        )?
        .set_default("encoder.program", "ffmpeg")?
        .set_default("assistant.model", "gemini-2.0-flash")?
        .set_default(
            "assistant.base_url",
            "https://generativelanguage.googleapis.com",
        )?
        .set_default("log.level", "warn")?
        .set_default("log.json", false)?;

    // 2. 用户级配置文件
    if let Some(path) = &sources.user_file {
        builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(false));
    }

    // 3. --config 或项目级配置文件
    if let Some(path) = &sources.explicit_file {
        if !path.is_file() {
            return Err(ConfigError::LoadError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(true));
    } else if let Some(path) = &sources.local_file {
        builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(false));
    }

    // 4. 带前缀的环境变量
    // 例如: GEN_MUSIC_GENERATION__DEFAULT_BPM=90
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(sources.env.clone()),
    );

    // 5. 通用环境变量（最高优先级），进程环境优先于 .env
    let dotenv = read_dotenv_files(&sources.dotenv_files)?;
    for (name, key) in WELL_KNOWN_ENV {
        let value = sources.lookup_env(name).or_else(|| {
            dotenv
                .get(*name)
                .filter(|v| !v.trim().is_empty())
                .cloned()
        });
        builder = builder.set_override_option(*key, value)?;
    }

    let config = builder.build()?;

    let mut app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    app_config.storage.output_dir = expand_home(&app_config.storage.output_dir);
    app_config.storage.history_path = expand_home(&app_config.storage.history_path);

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 展开开头的 `~`
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let generation = &config.generation;

    if generation.default_duration_secs == 0 {
        return Err(ConfigError::ValidationError(
            "generation.default_duration_secs must be positive".to_string(),
        ));
    }

    if generation.default_bpm == 0 {
        return Err(ConfigError::ValidationError(
            "generation.default_bpm must be positive".to_string(),
        ));
    }

    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&generation.temperature) {
        return Err(ConfigError::ValidationError(format!(
            "generation.temperature must be within [{}, {}]",
            MIN_TEMPERATURE, MAX_TEMPERATURE
        )));
    }

    if generation.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "generation.timeout_secs must be positive".to_string(),
        ));
    }

    if config.google.model_id.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "google.model_id cannot be empty".to_string(),
        ));
    }

    if config.storage.output_dir.as_os_str().is_empty()
        || config.storage.history_path.as_os_str().is_empty()
    {
        return Err(ConfigError::ValidationError(
            "storage paths cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（调试日志，凭据只显示是否设置）
pub fn print_config(config: &AppConfig) {
    let set = |v: &Option<String>| if v.is_some() { "set" } else { "unset" };

    tracing::debug!("=== Application Configuration ===");
    tracing::debug!("Engine: {:?}", config.engine.kind);
    tracing::debug!("Model: {} ({})", config.google.model_id, config.google.location);
    tracing::debug!("Project: {}", config.google.project_id.as_deref().unwrap_or("-"));
    tracing::debug!("API key: {}", set(&config.google.api_key));
    tracing::debug!("Access token: {}", set(&config.google.access_token));
    tracing::debug!("Output Directory: {}", config.storage.output_dir.display());
    tracing::debug!("History: {}", config.storage.history_path.display());
    tracing::debug!("Timeout: {}s", config.generation.timeout_secs);
    tracing::debug!("Format: {}", config.generation.format);
    tracing::debug!("Log Level: {}", config.log.level);
    tracing::debug!("=================================");
}
