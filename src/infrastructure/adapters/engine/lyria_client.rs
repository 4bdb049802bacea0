//! Lyria Client - Lyria RealTime WebSocket 会话
//!
//! 实现 MusicEnginePort trait
//!
//! 两种凭据:
//! - API key: Google AI 端点，`?key=` 查询参数
//! - project + OAuth access token: Vertex AI 端点，`Authorization: Bearer` 头

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::lyria_protocol::{
    close_error, parse_server_message, ClientMessage, PlaybackControl, ServerEvent,
};
use crate::application::ports::{ChunkStream, EngineError, MusicEnginePort};
use crate::domain::generation::{AudioChunk, AudioSpec, GenerationRequest};

const GOOGLE_AI_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateMusic";

/// 关闭会话时发送 STOP 和关闭帧的等待上限
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lyria 客户端配置
#[derive(Debug, Clone)]
pub struct LyriaClientConfig {
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub project_id: Option<String>,
    pub location: String,
    pub model_id: String,
    /// 显式指定的 WebSocket URL
    pub endpoint: Option<String>,
    /// 请求未指定 temperature 时使用
    pub default_temperature: f32,
    pub connect_timeout: Duration,
}

impl Default for LyriaClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            access_token: None,
            project_id: None,
            location: "us-central1".to_string(),
            model_id: "models/lyria-realtime-exp".to_string(),
            endpoint: None,
            default_temperature: 1.0,
            connect_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Credentials {
    ApiKey(String),
    Vertex { project_id: String, token: String },
}

/// Lyria RealTime 客户端
pub struct LyriaClient {
    config: LyriaClientConfig,
}

impl LyriaClient {
    pub fn new(config: LyriaClientConfig) -> Self {
        Self { config }
    }

    /// access token + project 优先，其次 API key
    fn credentials(&self) -> Result<Credentials, EngineError> {
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();

        if let (Some(project_id), Some(token)) = (
            non_empty(&self.config.project_id),
            non_empty(&self.config.access_token),
        ) {
            return Ok(Credentials::Vertex { project_id, token });
        }
        if let Some(key) = non_empty(&self.config.api_key) {
            return Ok(Credentials::ApiKey(key));
        }
        Err(EngineError::Authentication(
            "no credentials configured (set GOOGLE_API_KEY, or PROJECT_ID and GOOGLE_ACCESS_TOKEN)"
                .to_string(),
        ))
    }

    fn endpoint_url(&self, credentials: &Credentials) -> String {
        let base = match (&self.config.endpoint, credentials) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Credentials::ApiKey(_)) => GOOGLE_AI_ENDPOINT.to_string(),
            (None, Credentials::Vertex { .. }) => format!(
                "wss://{}-aiplatform.googleapis.com/ws/google.cloud.aiplatform.v1beta1.LlmBidiService.BidiGenerateMusic",
                self.config.location
            ),
        };

        match credentials {
            Credentials::ApiKey(key) => {
                let separator = if base.contains('?') { '&' } else { '?' };
                format!("{}{}key={}", base, separator, key)
            }
            Credentials::Vertex { .. } => base,
        }
    }

    /// Vertex 需要完整的资源名
    fn model_name(&self, credentials: &Credentials) -> String {
        match credentials {
            Credentials::ApiKey(_) => self.config.model_id.clone(),
            Credentials::Vertex { project_id, .. } => format!(
                "projects/{}/locations/{}/publishers/google/models/{}",
                project_id,
                self.config.location,
                self.config.model_id.trim_start_matches("models/")
            ),
        }
    }

    async fn connect(&self, credentials: &Credentials) -> Result<WsStream, EngineError> {
        let mut ws_request = self
            .endpoint_url(credentials)
            .into_client_request()
            .map_err(|e| EngineError::Remote(format!("invalid endpoint: {}", e)))?;

        if let Credentials::Vertex { token, .. } = credentials {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| EngineError::Authentication(format!("invalid access token: {}", e)))?;
            ws_request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws, _response) =
            tokio::time::timeout(self.config.connect_timeout, connect_async(ws_request))
                .await
                .map_err(|_| EngineError::Connection("timed out connecting to Lyria".into()))?
                .map_err(map_ws_error)?;

        Ok(ws)
    }
}

#[async_trait]
impl MusicEnginePort for LyriaClient {
    async fn open_session(
        &self,
        request: &GenerationRequest,
    ) -> Result<Box<dyn ChunkStream>, EngineError> {
        let credentials = self.credentials()?;
        let ws = self.connect(&credentials).await?;

        let mut session = LyriaSession::new(ws);
        session
            .send(&ClientMessage::setup(self.model_name(&credentials)))
            .await?;
        session.await_setup_complete().await?;

        session
            .send(&ClientMessage::generation_config(
                request,
                self.config.default_temperature,
            ))
            .await?;
        session.send(&ClientMessage::prompts(request)).await?;
        session
            .send(&ClientMessage::PlaybackControl(PlaybackControl::Play))
            .await?;

        tracing::info!(
            model = %self.config.model_id,
            bpm = request.bpm(),
            seed = ?request.seed(),
            "Lyria session started"
        );

        Ok(Box::new(session))
    }

    fn name(&self) -> &'static str {
        "lyria"
    }
}

/// 一个已建立的 Lyria 会话
struct LyriaSession {
    ws: WsStream,
    pending: VecDeque<Vec<u8>>,
    sequence: u64,
    finished: bool,
    closed: bool,
}

impl LyriaSession {
    fn new(ws: WsStream) -> Self {
        Self {
            ws,
            pending: VecDeque::new(),
            sequence: 0,
            finished: false,
            closed: false,
        }
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), EngineError> {
        let json = message.to_json()?;
        self.ws
            .send(Message::Text(json))
            .await
            .map_err(map_ws_error)
    }

    async fn await_setup_complete(&mut self) -> Result<(), EngineError> {
        loop {
            match self.read_event().await? {
                Some(ServerEvent::SetupComplete) => return Ok(()),
                Some(ServerEvent::Warning(warning)) => {
                    tracing::warn!(warning = %warning, "Lyria warning during setup")
                }
                Some(_) => continue,
                None => {
                    return Err(EngineError::Connection(
                        "session closed before setup completed".into(),
                    ))
                }
            }
        }
    }

    /// 读取下一条有意义的服务端事件，`Ok(None)` 表示正常关闭
    async fn read_event(&mut self) -> Result<Option<ServerEvent>, EngineError> {
        loop {
            let message = match self.ws.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(map_ws_error(e)),
                Some(Ok(message)) => message,
            };

            let payload = match message {
                Message::Text(text) => text.into_bytes(),
                Message::Binary(data) => data,
                Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((1000, String::new()));
                    return match close_error(code, &reason) {
                        Some(err) => Err(err),
                        None => Ok(None),
                    };
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            return parse_server_message(&payload).map(Some);
        }
    }
}

#[async_trait]
impl ChunkStream for LyriaSession {
    fn audio_spec(&self) -> AudioSpec {
        AudioSpec::LYRIA
    }

    async fn next_chunk(&mut self) -> Option<Result<AudioChunk, EngineError>> {
        loop {
            if let Some(data) = self.pending.pop_front() {
                let chunk = AudioChunk::new(self.sequence, data);
                self.sequence += 1;
                return Some(Ok(chunk));
            }
            if self.finished || self.closed {
                return None;
            }

            match self.read_event().await {
                Ok(Some(ServerEvent::Audio(chunks))) => self.pending.extend(chunks),
                Ok(Some(ServerEvent::Warning(warning))) => {
                    tracing::warn!(warning = %warning, "Lyria warning")
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::debug!(chunks = self.sequence, "Lyria stream ended");
                    self.finished = true;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending.clear();

        if !self.finished {
            let stop = ClientMessage::PlaybackControl(PlaybackControl::Stop);
            if let Err(e) = tokio::time::timeout(CLOSE_TIMEOUT, self.send(&stop)).await {
                tracing::debug!(error = %e, "Timed out sending STOP");
            }
        }
        match tokio::time::timeout(CLOSE_TIMEOUT, self.ws.close(None)).await {
            Ok(Ok(())) => tracing::debug!(chunks = self.sequence, "Lyria session closed"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Lyria close frame failed"),
            Err(_) => tracing::debug!("Timed out closing Lyria session"),
        }
    }
}

/// WebSocket 错误到引擎错误的映射
fn map_ws_error(err: WsError) -> EngineError {
    match err {
        WsError::Http(response) => {
            let status = response.status();
            let body = response
                .body()
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).to_string())
                .unwrap_or_default();
            let message = format!("HTTP {}: {}", status, body.trim());
            match status.as_u16() {
                401 | 403 => EngineError::Authentication(message),
                500..=599 => EngineError::Connection(message),
                _ => EngineError::Remote(message),
            }
        }
        WsError::Url(e) => EngineError::Remote(format!("invalid endpoint: {}", e)),
        other => EngineError::Connection(other.to_string()),
    }
}
