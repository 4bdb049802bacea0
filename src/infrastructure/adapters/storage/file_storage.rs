//! File Storage - 文件系统产物存储实现
//!
//! 实现 ArtifactStoragePort trait
//!
//! 命名: `allocate_path` 以 `create_new` 占位，并发生成同一提示词也不会拿到同一路径
//!
//! 写入: 同目录下唯一命名的临时文件 → fsync → rename 覆盖占位，
//! 中途失败时临时文件随 `TempPath` 析构删除

use async_trait::async_trait;
use chrono::Local;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::application::ports::{ArtifactStorageError, ArtifactStoragePort};
use crate::domain::generation::{AudioSpec, OutputFormat};
use crate::domain::{artifact_file_name, slugify, NamingConfig};

/// WAV 文件头长度
pub const WAV_HEADER_LEN: usize = 44;

/// 同名冲突时的最大尝试次数
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// 文件系统产物存储
pub struct FileArtifactStorage {
    /// 输出目录
    base_dir: PathBuf,
    naming: NamingConfig,
}

impl FileArtifactStorage {
    /// 创建新的文件存储
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self, ArtifactStorageError> {
        let base_dir = base_dir.as_ref().to_path_buf();

        // 确保目录存在
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| ArtifactStorageError::IoError(e.to_string()))?;

        Ok(Self {
            base_dir,
            naming: NamingConfig::default(),
        })
    }
}

/// 在 `path` 所在目录创建唯一命名的临时文件
///
/// 与目标同目录，保证最终 rename 不跨文件系统
pub(crate) fn sibling_temp_path(path: &Path) -> std::io::Result<TempPath> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(tempfile::Builder::new()
        .prefix(".gen-music-")
        .suffix(".partial")
        .tempfile_in(parent)?
        .into_temp_path())
}

/// 44 字节 RIFF/WAVE 文件头（PCM 整数格式）
pub fn encode_wav_header(spec: AudioSpec, data_size: u32) -> Vec<u8> {
    let byte_rate = spec.sample_rate * spec.block_align();
    let block_align = spec.block_align() as u16;
    let file_size = 36 + data_size;

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&file_size.to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&spec.channels.to_le_bytes());
    wav.extend_from_slice(&spec.sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&spec.bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());

    wav
}

async fn write_file(path: &Path, header: &[u8], pcm: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(header).await?;
    file.write_all(pcm).await?;
    file.flush().await?;
    file.sync_all().await
}

#[async_trait]
impl ArtifactStoragePort for FileArtifactStorage {
    async fn allocate_path(
        &self,
        prompt: &str,
        format: OutputFormat,
    ) -> Result<PathBuf, ArtifactStorageError> {
        let slug = slugify(prompt, &self.naming);
        let now = Local::now();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = artifact_file_name(&slug, &now, attempt, format.extension());
            let path = self.base_dir.join(name);
            let reserved = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match reserved {
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "Reserved artifact path");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(ArtifactStorageError::IoError(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        Err(ArtifactStorageError::IoError(format!(
            "no free file name for '{}' in {}",
            slug,
            self.base_dir.display()
        )))
    }

    async fn write_wav(
        &self,
        path: &Path,
        spec: AudioSpec,
        pcm: &[u8],
    ) -> Result<u64, ArtifactStorageError> {
        let data_size = u32::try_from(pcm.len())
            .ok()
            .filter(|size| size.checked_add(36).is_some())
            .ok_or(ArtifactStorageError::TooLarge(pcm.len() as u64))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ArtifactStorageError::IoError(e.to_string()))?;
        }

        let header = encode_wav_header(spec, data_size);

        let written = async {
            let temp = sibling_temp_path(path)?;
            write_file(&temp, &header, pcm).await?;
            temp.persist(path).map_err(|e| e.error)
        }
        .await;

        written.map_err(|e| {
            ArtifactStorageError::IoError(format!("{}: {}", path.display(), e))
        })?;

        let total = (header.len() + pcm.len()) as u64;
        tracing::debug!(path = %path.display(), bytes = total, "Saved artifact");

        Ok(total)
    }

    async fn delete(&self, path: &Path) -> Result<(), ArtifactStorageError> {
        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Deleted artifact");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ArtifactStorageError::IoError(e.to_string())),
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}
