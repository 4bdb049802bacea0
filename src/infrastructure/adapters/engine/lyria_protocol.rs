//! Lyria RealTime 线协议
//!
//! 客户端消息:
//! {"setup": {"model": "models/lyria-realtime-exp"}}
//! {"musicGenerationConfig": {"bpm": 120, "temperature": 1.0, "seed": 42}}
//! {"clientContent": {"weightedPrompts": [{"text": "...", "weight": 1.0}]}}
//! {"playbackControl": "PLAY" | "STOP"}
//!
//! 服务端消息（文本帧或二进制帧中的 JSON）:
//! {"setupComplete": {}}
//! {"serverContent": {"audioChunks": [{"data": "<base64 PCM>", "mimeType": "audio/l16;rate=48000;channels=2"}]}}
//! {"filteredPrompt": {"text": "...", "filteredReason": "..."}}
//! {"warning": "..."}
//! {"error": {"code": 400, "message": "...", "status": "INVALID_ARGUMENT"}}

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::application::ports::EngineError;
use crate::domain::generation::GenerationRequest;

/// `style` 作为第二个 prompt 时的权重
pub const STYLE_WEIGHT: f32 = 0.5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    MusicGenerationConfig(MusicGenerationConfig),
    ClientContent(ClientContent),
    PlaybackControl(PlaybackControl),
}

#[derive(Debug, Serialize)]
pub struct Setup {
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct MusicGenerationConfig {
    pub bpm: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub weighted_prompts: Vec<WeightedPrompt>,
}

#[derive(Debug, Serialize)]
pub struct WeightedPrompt {
    pub text: String,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackControl {
    Play,
    Stop,
}

impl ClientMessage {
    pub fn setup(model: impl Into<String>) -> Self {
        Self::Setup(Setup {
            model: model.into(),
        })
    }

    /// 未指定 temperature 时使用配置中的默认值
    pub fn generation_config(request: &GenerationRequest, default_temperature: f32) -> Self {
        Self::MusicGenerationConfig(MusicGenerationConfig {
            bpm: request.bpm(),
            temperature: request.temperature().unwrap_or(default_temperature),
            seed: request.seed(),
        })
    }

    pub fn prompts(request: &GenerationRequest) -> Self {
        let mut weighted_prompts = vec![WeightedPrompt {
            text: request.prompt().to_string(),
            weight: 1.0,
        }];
        if let Some(style) = request.style() {
            weighted_prompts.push(WeightedPrompt {
                text: style.to_string(),
                weight: STYLE_WEIGHT,
            });
        }
        Self::ClientContent(ClientContent { weighted_prompts })
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
    filtered_prompt: Option<FilteredPrompt>,
    warning: Option<String>,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    audio_chunks: Vec<AudioChunkPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioChunkPayload {
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilteredPrompt {
    text: Option<String>,
    filtered_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

/// 解码后的服务端事件
#[derive(Debug, PartialEq)]
pub enum ServerEvent {
    SetupComplete,
    /// 已解码的 PCM 数据，一条消息可能携带多个片段
    Audio(Vec<Vec<u8>>),
    Warning(String),
    /// 无关消息（如 keep-alive）
    Ignored,
}

/// 解析一条服务端消息
///
/// 被过滤的 prompt 和错误载荷作为 `Err` 返回
pub fn parse_server_message(payload: &[u8]) -> Result<ServerEvent, EngineError> {
    let message: ServerMessage = serde_json::from_slice(payload)
        .map_err(|e| EngineError::InvalidResponse(format!("malformed server message: {}", e)))?;

    if let Some(error) = message.error {
        return Err(api_error(error));
    }

    if let Some(filtered) = message.filtered_prompt {
        let reason = filtered
            .filtered_reason
            .unwrap_or_else(|| "no reason given".to_string());
        return Err(EngineError::Remote(match filtered.text {
            Some(text) => format!("prompt '{}' was filtered: {}", text, reason),
            None => format!("prompt was filtered: {}", reason),
        }));
    }

    if let Some(content) = message.server_content {
        let chunks = content
            .audio_chunks
            .into_iter()
            .filter(|c| !c.data.is_empty())
            .map(|c| {
                BASE64
                    .decode(c.data.as_bytes())
                    .map_err(|e| EngineError::InvalidResponse(format!("bad audio payload: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ServerEvent::Audio(chunks));
    }

    if message.setup_complete.is_some() {
        return Ok(ServerEvent::SetupComplete);
    }

    if let Some(warning) = message.warning {
        return Ok(ServerEvent::Warning(warning));
    }

    Ok(ServerEvent::Ignored)
}

fn api_error(error: ApiError) -> EngineError {
    let message = error.message.unwrap_or_else(|| "unknown error".to_string());
    match (error.code, error.status.as_deref()) {
        (Some(401 | 403), _) | (_, Some("UNAUTHENTICATED" | "PERMISSION_DENIED")) => {
            EngineError::Authentication(message)
        }
        (Some(503), _) | (_, Some("UNAVAILABLE")) => EngineError::Connection(message),
        _ => EngineError::Remote(message),
    }
}

/// 按关闭帧判定会话结束的性质，正常关闭返回 None
pub fn close_error(code: u16, reason: &str) -> Option<EngineError> {
    let reason = if reason.is_empty() {
        format!("session closed with code {}", code)
    } else {
        reason.to_string()
    };
    match code {
        1000 => None,
        1008 => Some(EngineError::Authentication(reason)),
        1001 | 1006 | 1012 | 1013 => Some(EngineError::Connection(reason)),
        _ => Some(EngineError::Remote(reason)),
    }
}
