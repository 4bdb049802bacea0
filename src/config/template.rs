//! Configuration Template - `gen-music init`

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::loader::ConfigError;

const TEMPLATE: &str = r#"# gen-music configuration
#
# Values here can be overridden by GEN_MUSIC_<SECTION>__<KEY> environment
# variables, and by PROJECT_ID, LOCATION, MODEL_ID, GOOGLE_API_KEY and
# GOOGLE_ACCESS_TOKEN. Those five may also live in ~/.config/gen-music/.env
# or ./.env.

[google]
# Google AI Studio API key (preferred)
# api_key = "your-api-key"

# Vertex AI: project id plus an OAuth access token
# (e.g. from `gcloud auth print-access-token`)
# project_id = "your-google-cloud-project-id"
# access_token = ""
location = "us-central1"
model_id = "models/lyria-realtime-exp"

[engine]
# "lyria" or "tone" (offline sine tone, no credentials needed)
kind = "lyria"

[generation]
default_duration_secs = 10
default_bpm = 120
temperature = 1.0
timeout_secs = 120
# "wav" or "mp3" (mp3 needs ffmpeg)
format = "wav"

[storage]
# output_dir = "~/Music"
# history_path = "~/.config/gen-music/history.db"

[playback]
# ffplay, pw-play, paplay, aplay or afplay; auto-detected when unset
# player = "ffplay"

[encoder]
# ffmpeg binary used for mp3 output
program = "ffmpeg"

[log]
level = "warn"
json = false
"#;

/// `init` 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created(PathBuf),
    /// 已存在且未指定 --force，文件保持不变
    AlreadyExists(PathBuf),
}

/// 写入带注释的配置模板（Unix 上权限为 0600）
pub fn write_template(path: &Path, force: bool) -> Result<InitOutcome, ConfigError> {
    if path.exists() && !force {
        return Ok(InitOutcome::AlreadyExists(path.to_path_buf()));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|e| ConfigError::WriteError(format!("{}: {}", path.display(), e)))?;
    file.write_all(TEMPLATE.as_bytes())
        .map_err(|e| ConfigError::WriteError(e.to_string()))?;

    // 覆盖已有文件时 mode 不生效，显式收紧权限
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;
    }

    tracing::info!(path = %path.display(), "Configuration template written");
    Ok(InitOutcome::Created(path.to_path_buf()))
}
