//! 应用层错误定义
//!
//! 统一的命令/查询错误类型，每种错误对应一个进程退出码

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::application::ports::{
    ArtifactStorageError, AssistantError, EncoderError, EngineError, PlaybackError,
    RepositoryError,
};
use crate::domain::generation::RequestError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 用户输入无效
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 凭据缺失或无效
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// 网络/会话失败（已自动重试一次）
    #[error("Connection error: {0}")]
    Connection(String),

    /// 远端拒绝请求
    #[error("Remote service error: {0}")]
    Remote(String),

    /// 上游结束前没有收到任何片段
    #[error("The generation stream ended before any audio was received")]
    EmptyStream,

    /// 产物写入失败
    #[error("Failed to write output: {0}")]
    Write(String),

    /// 整体生成超时
    #[error("Generation timed out after {}", format_timeout(.0))]
    Timeout(Duration),

    /// 用户中断
    #[error("Generation cancelled")]
    Cancelled,

    /// 历史记录引用的产物已不在磁盘上
    #[error("Artifact for history item {index} is missing: {}", path.display())]
    ArtifactMissing { index: u64, path: PathBuf },

    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 仓储错误
    #[error("Repository error: {0}")]
    Repository(String),

    /// 播放失败
    #[error("Playback failed: {0}")]
    Playback(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_timeout(timeout: &Duration) -> String {
    if timeout.subsec_millis() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// 创建输入无效错误
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 进程退出码
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidRequest(_) => 2,
            Self::Authentication(_) => 3,
            Self::Connection(_) => 4,
            Self::Remote(_) => 5,
            Self::EmptyStream => 6,
            Self::Write(_) => 7,
            Self::Timeout(_) => 8,
            Self::ArtifactMissing { .. } => 9,
            Self::NotFound { .. } => 10,
            Self::Cancelled => 130,
            Self::Repository(_)
            | Self::Playback(_)
            | Self::Configuration(_)
            | Self::Internal(_) => 1,
        }
    }

    /// 面向用户的补救提示
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Authentication(_) => Some(
                "Run 'gen-music init' and set google.api_key (or GOOGLE_API_KEY), \
                 or set PROJECT_ID and GOOGLE_ACCESS_TOKEN for Vertex AI.",
            ),
            Self::ArtifactMissing { .. } => {
                Some("The output file was moved or deleted; the history entry is kept as-is.")
            }
            Self::NotFound { .. } => Some("Run 'gen-music history' to see valid IDs."),
            Self::Connection(_) => Some("Check your network connection and try again."),
            _ => None,
        }
    }
}

impl From<RequestError> for ApplicationError {
    fn from(err: RequestError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<EngineError> for ApplicationError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Authentication(msg) => Self::Authentication(msg),
            EngineError::Connection(msg) => Self::Connection(msg),
            EngineError::Remote(msg) => Self::Remote(msg),
            EngineError::InvalidResponse(msg) => Self::Remote(format!("invalid response: {}", msg)),
        }
    }
}

impl From<ArtifactStorageError> for ApplicationError {
    fn from(err: ArtifactStorageError) -> Self {
        Self::Write(err.to_string())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err.to_string())
    }
}

impl From<PlaybackError> for ApplicationError {
    fn from(err: PlaybackError) -> Self {
        Self::Playback(err.to_string())
    }
}

impl From<EncoderError> for ApplicationError {
    fn from(err: EncoderError) -> Self {
        match err {
            EncoderError::Unavailable(msg) => Self::Configuration(msg),
            other => Self::Write(other.to_string()),
        }
    }
}

impl From<AssistantError> for ApplicationError {
    fn from(err: AssistantError) -> Self {
        Self::Remote(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_non_zero() {
        let errors = [
            ApplicationError::invalid_request("x"),
            ApplicationError::EmptyStream,
            ApplicationError::Timeout(Duration::from_secs(5)),
            ApplicationError::not_found("History item", 99),
            ApplicationError::Cancelled,
            ApplicationError::internal("x"),
        ];
        for err in errors {
            assert_ne!(err.exit_code(), 0, "{}", err);
        }
    }

    #[test]
    fn test_engine_error_mapping() {
        let err: ApplicationError = EngineError::Authentication("bad key".into()).into();
        assert!(matches!(err, ApplicationError::Authentication(_)));
        assert!(err.hint().is_some());

        let err: ApplicationError = EngineError::Remote("unsupported bpm".into()).into();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_timeout_message_keeps_sub_second_precision() {
        assert_eq!(
            ApplicationError::Timeout(Duration::from_millis(200)).to_string(),
            "Generation timed out after 200ms"
        );
        assert_eq!(
            ApplicationError::Timeout(Duration::from_secs(120)).to_string(),
            "Generation timed out after 120s"
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = ApplicationError::not_found("History item", 99);
        assert_eq!(err.to_string(), "History item not found: 99");
    }
}
