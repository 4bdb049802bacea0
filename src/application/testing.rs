//! 应用层测试替身

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::application::ports::{
    AssistantError, AudioEncoderPort, AudioPlayerPort, EncoderError, HistoryRepositoryPort,
    PlaybackError, PromptAssistantPort, RepositoryError,
};
use crate::domain::generation::OutputFormat;
use crate::domain::history::{HistoryRecord, NewHistoryRecord};

/// 记录播放请求的播放器
#[derive(Default)]
pub struct RecordingPlayer {
    played: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl RecordingPlayer {
    pub fn failing() -> Self {
        Self {
            played: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioPlayerPort for RecordingPlayer {
    async fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        if self.fail {
            return Err(PlaybackError::PlayerUnavailable("no player in test".into()));
        }
        self.played.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// 内存历史仓储
#[derive(Default)]
pub struct InMemoryHistoryRepository {
    records: Mutex<Vec<HistoryRecord>>,
}

#[async_trait]
impl HistoryRepositoryPort for InMemoryHistoryRepository {
    async fn append(&self, record: NewHistoryRecord) -> Result<HistoryRecord, RepositoryError> {
        let mut records = self.records.lock().unwrap();
        let index = records.last().map(|r| r.index + 1).unwrap_or(1);
        let record = HistoryRecord::from_new(index, record);
        records.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>, RepositoryError> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn get(&self, index: u64) -> Result<Option<HistoryRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.index == index)
            .cloned())
    }
}

/// 总是写入失败的历史仓储
pub struct FailingHistoryRepository;

#[async_trait]
impl HistoryRepositoryPort for FailingHistoryRepository {
    async fn append(&self, _record: NewHistoryRecord) -> Result<HistoryRecord, RepositoryError> {
        Err(RepositoryError::DatabaseError("disk I/O error".into()))
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn get(&self, _index: u64) -> Result<Option<HistoryRecord>, RepositoryError> {
        Ok(None)
    }
}

/// 固定回复的 prompt 改写器
pub struct StubAssistant {
    reply: Option<String>,
}

impl StubAssistant {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl PromptAssistantPort for StubAssistant {
    async fn optimize_prompt(&self, _prompt: &str) -> Result<String, AssistantError> {
        self.reply
            .clone()
            .ok_or_else(|| AssistantError::ServiceError("quota exceeded".into()))
    }
}

/// 直接复制 WAV 字节的编码器，记录每次调用
#[derive(Default)]
pub struct CopyingEncoder {
    encoded: Mutex<Vec<(PathBuf, OutputFormat)>>,
    unavailable: bool,
}

impl CopyingEncoder {
    pub fn unavailable() -> Self {
        Self {
            encoded: Mutex::new(Vec::new()),
            unavailable: true,
        }
    }

    pub fn encoded(&self) -> Vec<(PathBuf, OutputFormat)> {
        self.encoded.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioEncoderPort for CopyingEncoder {
    async fn ensure_available(&self, _format: OutputFormat) -> Result<(), EncoderError> {
        if self.unavailable {
            return Err(EncoderError::Unavailable("ffmpeg not found in PATH".into()));
        }
        Ok(())
    }

    async fn encode(
        &self,
        wav: &Path,
        output: &Path,
        format: OutputFormat,
    ) -> Result<(), EncoderError> {
        std::fs::copy(wav, output).map_err(|e| EncoderError::IoError(e.to_string()))?;
        self.encoded
            .lock()
            .unwrap()
            .push((output.to_path_buf(), format));
        Ok(())
    }
}
