//! Prompt Assistant Port - prompt 改写抽象

use async_trait::async_trait;
use thiserror::Error;

/// 改写错误
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Assistant not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Prompt Assistant Port
///
/// 调用文本模型把简短描述扩写为适合音乐生成的 prompt
#[async_trait]
pub trait PromptAssistantPort: Send + Sync {
    async fn optimize_prompt(&self, prompt: &str) -> Result<String, AssistantError>;
}
