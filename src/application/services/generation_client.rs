//! Generation Client - 带重试的会话建立
//!
//! 在引擎端口之上加入请求校验与一次连接重试。
//! 重试窗口覆盖会话建立以及等待首个片段，首个片段会被缓存并原样交给消费方。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::application::error::ApplicationError;
use crate::application::ports::{ChunkStream, EngineError, MusicEnginePort};
use crate::domain::generation::{AudioChunk, AudioSpec, GenerationRequest};

/// 客户端配置
#[derive(Debug, Clone)]
pub struct GenerationClientConfig {
    /// 连接失败后的等待时间
    pub retry_backoff: Duration,
    /// 最大自动重试次数
    pub max_retries: u32,
}

impl Default for GenerationClientConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_millis(500),
            max_retries: 1,
        }
    }
}

/// Generation Client
pub struct GenerationClient {
    engine: Arc<dyn MusicEnginePort>,
    config: GenerationClientConfig,
}

impl GenerationClient {
    pub fn new(engine: Arc<dyn MusicEnginePort>, config: GenerationClientConfig) -> Self {
        Self { engine, config }
    }

    /// 建立会话
    ///
    /// 只有 `EngineError::Connection` 会被重试；认证失败与远端拒绝立即返回。
    pub async fn open_session(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationStream, ApplicationError> {
        request.validate()?;

        let mut retries = 0u32;
        loop {
            match self.try_open(request).await {
                Ok(mut stream) => {
                    stream.retries = retries;
                    tracing::debug!(
                        engine = self.engine.name(),
                        retries = retries,
                        "Generation session established"
                    );
                    return Ok(stream);
                }
                Err(e) if e.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        engine = self.engine.name(),
                        attempt = retries,
                        backoff_ms = self.config.retry_backoff.as_millis() as u64,
                        error = %e,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => {
                    tracing::error!(engine = self.engine.name(), error = %e, "Failed to open session");
                    return Err(e.into());
                }
            }
        }
    }

    async fn try_open(&self, request: &GenerationRequest) -> Result<GenerationStream, EngineError> {
        let mut inner = self.engine.open_session(request).await?;

        match inner.next_chunk().await {
            Some(Ok(chunk)) => Ok(GenerationStream::new(inner, Some(chunk))),
            Some(Err(e)) => {
                inner.close().await;
                Err(e)
            }
            // 空流交给 Stream Assembler 判定
            None => Ok(GenerationStream::new(inner, None)),
        }
    }
}

/// 已建立的生成会话
pub struct GenerationStream {
    inner: Box<dyn ChunkStream>,
    pending: Option<AudioChunk>,
    retries: u32,
    closed: bool,
}

impl GenerationStream {
    fn new(inner: Box<dyn ChunkStream>, pending: Option<AudioChunk>) -> Self {
        Self {
            inner,
            pending,
            retries: 0,
            closed: false,
        }
    }

    /// 建立会话时发生的重试次数
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

#[async_trait]
impl ChunkStream for GenerationStream {
    fn audio_spec(&self) -> AudioSpec {
        self.inner.audio_spec()
    }

    async fn next_chunk(&mut self) -> Option<Result<AudioChunk, EngineError>> {
        if let Some(chunk) = self.pending.take() {
            return Some(Ok(chunk));
        }
        if self.closed {
            return None;
        }
        self.inner.next_chunk().await
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.pending = None;
            self.inner.close().await;
        }
    }
}
