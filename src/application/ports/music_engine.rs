//! Music Engine Port - 实时音乐生成引擎抽象
//!
//! 定义远端生成会话的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::generation::{AudioChunk, AudioSpec, GenerationRequest};

/// 引擎错误
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// 凭据缺失或无效
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// 网络或会话建立失败（可重试）
    #[error("Connection error: {0}")]
    Connection(String),

    /// 远端拒绝请求
    #[error("Remote error: {0}")]
    Remote(String),

    /// 远端返回了无法解析的数据
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl EngineError {
    /// 是否属于可自动重试的连接类错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Connection(_))
    }
}

/// 生成会话的音频片段流
///
/// 惰性、只进、有限；由消费方决定何时关闭。
#[async_trait]
pub trait ChunkStream: Send {
    /// 流的音频格式
    fn audio_spec(&self) -> AudioSpec;

    /// 等待下一个片段
    ///
    /// - `Some(Ok(chunk))` - 新片段
    /// - `Some(Err(e))` - 会话出错，之后不再产生片段
    /// - `None` - 远端正常结束
    async fn next_chunk(&mut self) -> Option<Result<AudioChunk, EngineError>>;

    /// 关闭上游会话，可重复调用
    async fn close(&mut self);
}

/// Music Engine Port
///
/// 外部实时音乐生成服务的抽象接口
#[async_trait]
pub trait MusicEnginePort: Send + Sync {
    /// 建立会话并提交请求，返回片段流
    async fn open_session(
        &self,
        request: &GenerationRequest,
    ) -> Result<Box<dyn ChunkStream>, EngineError>;

    /// 引擎名称（用于日志）
    fn name(&self) -> &'static str;
}
