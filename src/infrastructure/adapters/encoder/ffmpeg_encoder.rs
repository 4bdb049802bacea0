//! FFmpeg Encoder - 通过 ffmpeg 把 WAV 转成 MP3
//!
//! 输出先写到目标目录下的临时文件，成功后 rename 到目标路径

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;

use crate::application::ports::{AudioEncoderPort, EncoderError};
use crate::domain::generation::OutputFormat;
use crate::infrastructure::adapters::playback::find_executable;
use crate::infrastructure::adapters::storage::sibling_temp_path;

/// 默认编码程序
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// ffmpeg 编码器
pub struct FfmpegEncoder {
    program: String,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            program: if program.trim().is_empty() {
                DEFAULT_FFMPEG.to_string()
            } else {
                program
            },
        }
    }

    fn locate(&self) -> Result<PathBuf, EncoderError> {
        find_executable(&self.program).ok_or_else(|| {
            EncoderError::Unavailable(format!(
                "'{}' not found on PATH; install ffmpeg or set encoder.program",
                self.program
            ))
        })
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG)
    }
}

/// `-f` 显式指定容器，临时文件的扩展名不影响输出
fn encoder_args(input: &Path, output: &Path, format: OutputFormat) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-loglevel".into(), "error".into()];
    args.push("-i".into());
    args.push(input.as_os_str().to_os_string());
    match format {
        OutputFormat::Mp3 => {
            args.extend(
                ["-codec:a", "libmp3lame", "-q:a", "2", "-f", "mp3"]
                    .iter()
                    .map(Into::into),
            );
        }
        OutputFormat::Wav => args.extend(["-f", "wav"].iter().map(Into::into)),
    }
    args.push(output.as_os_str().to_os_string());
    args
}

#[async_trait]
impl AudioEncoderPort for FfmpegEncoder {
    async fn ensure_available(&self, format: OutputFormat) -> Result<(), EncoderError> {
        if format == OutputFormat::Wav {
            return Ok(());
        }
        self.locate().map(|_| ())
    }

    async fn encode(
        &self,
        wav: &Path,
        output: &Path,
        format: OutputFormat,
    ) -> Result<(), EncoderError> {
        let io_error =
            |e: std::io::Error| EncoderError::IoError(format!("{}: {}", output.display(), e));

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let temp = sibling_temp_path(output).map_err(io_error)?;

        if format == OutputFormat::Wav {
            fs::copy(wav, &temp).await.map_err(io_error)?;
        } else {
            let program = self.locate()?;
            tracing::debug!(
                program = %program.display(),
                input = %wav.display(),
                format = %format,
                "Encoding artifact"
            );

            let result = Command::new(&program)
                .args(encoder_args(wav, &temp, format))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| EncoderError::Failed(format!("{}: {}", program.display(), e)))?;

            if !result.status.success() {
                let stderr = String::from_utf8_lossy(&result.stderr);
                return Err(EncoderError::Failed(format!(
                    "{} exited with {}: {}",
                    program.display(),
                    result.status,
                    stderr.trim()
                )));
            }
        }

        temp.persist(output).map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_mp3_args() {
        let args = encoder_args(Path::new("/tmp/in.wav"), Path::new("/tmp/out"), OutputFormat::Mp3);
        assert_eq!(args[3], "-i");
        assert_eq!(args[4], "/tmp/in.wav");
        assert!(args.iter().any(|a| a == "libmp3lame"));
        assert_eq!(args.last().unwrap(), "/tmp/out");
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let encoder = FfmpegEncoder::new("no-such-encoder-xyz");
        assert!(matches!(
            encoder.ensure_available(OutputFormat::Mp3).await,
            Err(EncoderError::Unavailable(_))
        ));
        assert!(encoder.ensure_available(OutputFormat::Wav).await.is_ok());
    }

    #[tokio::test]
    async fn test_wav_passthrough_copies() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out/copy.wav");
        std::fs::write(&input, b"RIFFdata").unwrap();

        FfmpegEncoder::new("no-such-encoder-xyz")
            .encode(&input, &output, OutputFormat::Wav)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"RIFFdata");
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encode_replaces_output_atomically() {
        let dir = tempdir().unwrap();
        // 把输入原样复制到最后一个参数
        let fake = script(
            dir.path(),
            "fake-ffmpeg",
            r#"for a in "$@"; do last="$a"; done; cp "$5" "$last""#,
        );
        let input = dir.path().join("in.wav");
        let output = dir.path().join("song.mp3");
        std::fs::write(&input, b"encoded").unwrap();
        std::fs::write(&output, b"").unwrap();

        let encoder = FfmpegEncoder::new(fake.to_string_lossy());
        encoder.ensure_available(OutputFormat::Mp3).await.unwrap();
        encoder
            .encode(&input, &output, OutputFormat::Mp3)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"encoded");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encoder_failure_keeps_output_untouched() {
        let dir = tempdir().unwrap();
        let fake = script(dir.path(), "broken-ffmpeg", "echo 'unknown encoder' >&2; exit 1");
        let input = dir.path().join("in.wav");
        let output = dir.path().join("song.mp3");
        std::fs::write(&input, b"RIFF").unwrap();

        let result = FfmpegEncoder::new(fake.to_string_lossy())
            .encode(&input, &output, OutputFormat::Mp3)
            .await;

        match result {
            Err(EncoderError::Failed(msg)) => assert!(msg.contains("unknown encoder")),
            other => panic!("expected encoder failure, got {:?}", other),
        }
        assert!(!output.exists());
    }
}
