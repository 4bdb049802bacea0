//! Command Player - 调用外部播放程序
//!
//! 未指定播放器时按顺序查找: ffplay, pw-play, paplay, aplay, afplay

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::application::ports::{AudioPlayerPort, PlaybackError};

/// 自动探测的候选播放器
pub const KNOWN_PLAYERS: [&str; 5] = ["ffplay", "pw-play", "paplay", "aplay", "afplay"];

/// 外部程序播放器
pub struct CommandAudioPlayer {
    /// 配置指定的播放器，None 表示自动探测
    preferred: Option<String>,
}

impl CommandAudioPlayer {
    pub fn new(preferred: Option<String>) -> Self {
        Self {
            preferred: preferred.filter(|p| !p.trim().is_empty()),
        }
    }

    fn detect_player(&self) -> Result<PathBuf, PlaybackError> {
        match &self.preferred {
            Some(player) => find_executable(player).ok_or_else(|| {
                PlaybackError::PlayerUnavailable(format!("player '{}' not found on PATH", player))
            }),
            None => KNOWN_PLAYERS
                .iter()
                .find_map(|p| find_executable(p))
                .ok_or_else(|| {
                    PlaybackError::PlayerUnavailable(format!(
                        "no supported audio player found (tried {}); set playback.player",
                        KNOWN_PLAYERS.join(", ")
                    ))
                }),
        }
    }
}

/// 在 PATH 中查找可执行文件；带路径分隔符的名称按路径处理
pub(crate) fn find_executable(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(command))
        .find(|p| p.is_file())
}

/// 各播放器所需的参数
fn player_args(player: &Path, file: &Path) -> Vec<std::ffi::OsString> {
    let name = player
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut args: Vec<std::ffi::OsString> = match name.as_str() {
        "ffplay" => ["-nodisp", "-autoexit", "-loglevel", "error"]
            .iter()
            .map(Into::into)
            .collect(),
        "aplay" => vec!["-q".into()],
        _ => Vec::new(),
    };
    args.push(file.as_os_str().to_os_string());
    args
}

#[async_trait]
impl AudioPlayerPort for CommandAudioPlayer {
    async fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        if !path.is_file() {
            return Err(PlaybackError::FileNotFound(path.display().to_string()));
        }

        let player = self.detect_player()?;
        tracing::debug!(player = %player.display(), path = %path.display(), "Starting playback");

        let status = Command::new(&player)
            .args(player_args(&player, path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| PlaybackError::PlayerFailed(format!("{}: {}", player.display(), e)))?;

        if !status.success() {
            return Err(PlaybackError::PlayerFailed(format!(
                "{} exited with {}",
                player.display(),
                status
            )));
        }

        Ok(())
    }
}
