//! Stream Assembler - 时长预算下的片段拼接
//!
//! 停止策略:
//! - 累计时长达到目标即关闭上游，最后一个片段按帧截断，实际时长恰好等于目标
//! - 上游提前结束时按已采集内容收尾，不视为错误
//! - 一个片段都没收到时返回 `EmptyStream`
//!
//! 时长完全由字节数和流的音频格式推算。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::ports::{ArtifactStoragePort, ChunkStream};
use crate::domain::generation::{AudioSpec, GeneratedArtifact, OutputFormat};

/// 单次生成的运行约束
///
/// deadline 覆盖整个生成过程（建立会话 + 拼接），不是单个片段的超时
#[derive(Debug, Clone)]
pub struct RunLimits {
    pub deadline: Instant,
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

impl RunLimits {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            timeout,
            cancel,
        }
    }

    pub fn timeout_error(&self) -> ApplicationError {
        ApplicationError::Timeout(self.timeout)
    }

    /// 在取消令牌和截止时间的约束下执行 future
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ApplicationError>
    where
        F: std::future::Future<Output = Result<T, ApplicationError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ApplicationError::Cancelled),
            result = tokio::time::timeout_at(self.deadline, fut) => {
                result.map_err(|_| self.timeout_error())?
            }
        }
    }
}

/// 拼接结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 达到目标时长
    BudgetMet,
    /// 上游提前结束
    EndOfStream,
}

/// 内存中的拼接结果
#[derive(Debug, Clone)]
pub struct CapturedAudio {
    pub spec: AudioSpec,
    pub pcm: Vec<u8>,
    pub chunk_count: u64,
    pub stop_reason: StopReason,
}

impl CapturedAudio {
    pub fn duration(&self) -> Duration {
        self.spec.duration_of(self.pcm.len() as u64)
    }
}

/// 预分配上限，避免超长时长一次性占用内存
const MAX_PREALLOC_BYTES: usize = 16 * 1024 * 1024;

/// Stream Assembler
pub struct StreamAssembler {
    storage: Arc<dyn ArtifactStoragePort>,
}

impl StreamAssembler {
    pub fn new(storage: Arc<dyn ArtifactStoragePort>) -> Self {
        Self { storage }
    }

    /// 消费片段流并把结果原子写入 `destination`
    pub async fn assemble(
        &self,
        stream: &mut dyn ChunkStream,
        target_secs: u32,
        destination: &Path,
        limits: &RunLimits,
    ) -> Result<GeneratedArtifact, ApplicationError> {
        let captured = self.capture(stream, target_secs, limits).await?;

        self.storage
            .write_wav(destination, captured.spec, &captured.pcm)
            .await?;

        let artifact = GeneratedArtifact {
            path: destination.to_path_buf(),
            spec: captured.spec,
            pcm_bytes: captured.pcm.len() as u64,
            actual_duration: captured.duration(),
            chunk_count: captured.chunk_count,
            format: OutputFormat::Wav,
        };

        tracing::info!(
            path = %artifact.path.display(),
            actual_ms = artifact.actual_duration_ms(),
            chunks = artifact.chunk_count,
            "Artifact written"
        );

        Ok(artifact)
    }

    /// 只负责消费和拼接，不落盘
    ///
    /// 无论结果如何，返回前都会关闭上游
    pub async fn capture(
        &self,
        stream: &mut dyn ChunkStream,
        target_secs: u32,
        limits: &RunLimits,
    ) -> Result<CapturedAudio, ApplicationError> {
        let spec = stream.audio_spec();
        let target_bytes = spec.bytes_for(target_secs) as usize;

        let mut pcm: Vec<u8> = Vec::with_capacity(target_bytes.min(MAX_PREALLOC_BYTES));
        let mut chunk_count = 0u64;
        let mut next_sequence = 0u64;

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = limits.cancel.cancelled() => break Err(ApplicationError::Cancelled),
                _ = tokio::time::sleep_until(limits.deadline) => break Err(limits.timeout_error()),
                next = stream.next_chunk() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    if chunk.sequence != next_sequence {
                        tracing::warn!(
                            expected = next_sequence,
                            got = chunk.sequence,
                            "Chunk sequence gap, keeping arrival order"
                        );
                    }
                    next_sequence = chunk.sequence + 1;
                    chunk_count += 1;

                    let remaining = target_bytes - pcm.len();
                    if chunk.len() >= remaining {
                        pcm.extend_from_slice(&chunk.data[..remaining]);
                        break Ok(StopReason::BudgetMet);
                    }
                    pcm.extend_from_slice(&chunk.data);
                }
                Some(Err(e)) => break Err(ApplicationError::from(e)),
                None => break Ok(StopReason::EndOfStream),
            }
        };

        stream.close().await;

        let stop_reason = match outcome {
            Ok(reason) => reason,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    chunks = chunk_count,
                    captured_bytes = pcm.len(),
                    "Stream aborted, discarding captured audio"
                );
                return Err(e);
            }
        };

        if chunk_count == 0 {
            return Err(ApplicationError::EmptyStream);
        }

        let captured = CapturedAudio {
            spec,
            pcm,
            chunk_count,
            stop_reason,
        };

        match stop_reason {
            StopReason::BudgetMet => tracing::debug!(
                chunks = chunk_count,
                "Duration budget reached, session closed"
            ),
            StopReason::EndOfStream => tracing::info!(
                chunks = chunk_count,
                captured_ms = captured.duration().as_millis() as u64,
                target_secs = target_secs,
                "Upstream ended before target duration"
            ),
        }

        Ok(captured)
    }
}
