//! Fake Music Client - 离线音乐引擎
//!
//! 两种模式:
//! - tone: 按 bpm 打拍的正弦音，离线试用和演示用（`engine.kind = "tone"`）
//! - scripted: 按脚本逐步产出片段或错误，测试用

use async_trait::async_trait;
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::application::ports::{ChunkStream, EngineError, MusicEnginePort};
use crate::domain::generation::{AudioChunk, AudioSpec, GenerationRequest};

/// 脚本中的一步
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// 产出 n 秒静音
    Seconds(u32),
    /// 产出指定字节
    Audio(Vec<u8>),
    /// 会话出错
    Fail(EngineError),
    /// 永不返回
    Stall,
}

/// Tone 模式配置
#[derive(Debug, Clone)]
pub struct ToneConfig {
    /// 每个片段的时长（毫秒）
    pub chunk_ms: u32,
    /// 片段之间的间隔，模拟实时推送
    pub chunk_delay: Duration,
    /// 音量 (0.0 - 1.0)
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            chunk_ms: 500,
            chunk_delay: Duration::from_millis(20),
            amplitude: 0.3,
        }
    }
}

enum Mode {
    Tone(ToneConfig),
    Scripted(Mutex<VecDeque<Vec<ScriptedStep>>>),
}

/// Fake Music Client
pub struct FakeMusicClient {
    mode: Mode,
    spec: AudioSpec,
    failing_opens: Mutex<Option<(u32, EngineError)>>,
    opened: AtomicU32,
    closed: Arc<AtomicU32>,
}

impl FakeMusicClient {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            spec: AudioSpec::LYRIA,
            failing_opens: Mutex::new(None),
            opened: AtomicU32::new(0),
            closed: Arc::new(AtomicU32::new(0)),
        }
    }

    /// 离线正弦音引擎
    pub fn tone(config: ToneConfig) -> Self {
        tracing::info!(chunk_ms = config.chunk_ms, "FakeMusicClient initialized in tone mode");
        Self::with_mode(Mode::Tone(config))
    }

    /// 每次 `open_session` 依次取用一个脚本
    pub fn scripted(sessions: Vec<Vec<ScriptedStep>>) -> Self {
        Self::with_mode(Mode::Scripted(Mutex::new(sessions.into())))
    }

    /// 前 n 次建立会话直接失败（不消耗脚本）
    pub fn fail_first_opens(self, n: u32, error: EngineError) -> Self {
        if let Ok(mut failing) = self.failing_opens.lock() {
            *failing = Some((n, error));
        }
        self
    }

    /// `open_session` 被调用的次数（含失败）
    pub fn sessions_opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    /// 被关闭的会话数
    pub fn sessions_closed(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }

    fn take_open_failure(&self) -> Option<EngineError> {
        let mut failing = self.failing_opens.lock().ok()?;
        match failing.as_mut() {
            Some((remaining, error)) if *remaining > 0 => {
                *remaining -= 1;
                Some(error.clone())
            }
            _ => None,
        }
    }
}

#[async_trait]
impl MusicEnginePort for FakeMusicClient {
    async fn open_session(
        &self,
        request: &GenerationRequest,
    ) -> Result<Box<dyn ChunkStream>, EngineError> {
        self.opened.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.take_open_failure() {
            return Err(error);
        }

        let guard = CloseCounter {
            closed: false,
            counter: self.closed.clone(),
        };

        match &self.mode {
            Mode::Tone(config) => {
                tracing::debug!(prompt = %request.prompt(), bpm = request.bpm(), "Tone session opened");
                Ok(Box::new(ToneStream::new(self.spec, config.clone(), request, guard)))
            }
            Mode::Scripted(sessions) => {
                let steps = sessions
                    .lock()
                    .map_err(|e| EngineError::Connection(e.to_string()))?
                    .pop_front()
                    .ok_or_else(|| EngineError::Connection("no scripted session left".into()))?;
                Ok(Box::new(ScriptedStream {
                    spec: self.spec,
                    steps: steps.into(),
                    sequence: 0,
                    guard,
                }))
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Tone(_) => "tone",
            Mode::Scripted(_) => "scripted",
        }
    }
}

/// 记录关闭次数，每个会话只计一次
struct CloseCounter {
    closed: bool,
    counter: Arc<AtomicU32>,
}

impl CloseCounter {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct ScriptedStream {
    spec: AudioSpec,
    steps: VecDeque<ScriptedStep>,
    sequence: u64,
    guard: CloseCounter,
}

impl ScriptedStream {
    fn emit(&mut self, data: Vec<u8>) -> AudioChunk {
        let chunk = AudioChunk::new(self.sequence, data);
        self.sequence += 1;
        chunk
    }
}

#[async_trait]
impl ChunkStream for ScriptedStream {
    fn audio_spec(&self) -> AudioSpec {
        self.spec
    }

    async fn next_chunk(&mut self) -> Option<Result<AudioChunk, EngineError>> {
        if self.guard.closed {
            return None;
        }
        match self.steps.pop_front()? {
            ScriptedStep::Seconds(secs) => {
                let data = vec![0u8; self.spec.bytes_for(secs) as usize];
                Some(Ok(self.emit(data)))
            }
            ScriptedStep::Audio(data) => Some(Ok(self.emit(data))),
            ScriptedStep::Fail(error) => {
                self.steps.clear();
                Some(Err(error))
            }
            ScriptedStep::Stall => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.guard.close();
    }
}

/// 无限正弦音流，由消费方按时长预算关闭
struct ToneStream {
    spec: AudioSpec,
    config: ToneConfig,
    frequency: f32,
    frames_per_beat: u64,
    frame: u64,
    sequence: u64,
    guard: CloseCounter,
}

impl ToneStream {
    fn new(spec: AudioSpec, config: ToneConfig, request: &GenerationRequest, guard: CloseCounter) -> Self {
        Self {
            spec,
            config,
            frequency: tone_frequency(request),
            frames_per_beat: u64::from(spec.sample_rate) * 60 / u64::from(request.bpm().max(1)),
            frame: 0,
            sequence: 0,
            guard,
        }
    }

    fn render(&mut self) -> Vec<u8> {
        let frames = u64::from(self.spec.sample_rate) * u64::from(self.config.chunk_ms) / 1000;
        let channels = usize::from(self.spec.channels);
        let mut data = Vec::with_capacity(frames as usize * channels * 2);
        let rate = self.spec.sample_rate as f32;

        for _ in 0..frames {
            let t = self.frame as f32 / rate;
            let since_beat = (self.frame % self.frames_per_beat.max(1)) as f32 / rate;
            let envelope = (-since_beat * 6.0).exp();
            let value = (2.0 * PI * self.frequency * t).sin() * envelope * self.config.amplitude;
            let sample = (value.clamp(-1.0, 1.0) * 32767.0) as i16;
            for _ in 0..channels {
                data.extend_from_slice(&sample.to_le_bytes());
            }
            self.frame += 1;
        }
        data
    }
}

#[async_trait]
impl ChunkStream for ToneStream {
    fn audio_spec(&self) -> AudioSpec {
        self.spec
    }

    async fn next_chunk(&mut self) -> Option<Result<AudioChunk, EngineError>> {
        if self.guard.closed {
            return None;
        }
        if self.sequence > 0 && !self.config.chunk_delay.is_zero() {
            tokio::time::sleep(self.config.chunk_delay).await;
        }
        let chunk = AudioChunk::new(self.sequence, self.render());
        self.sequence += 1;
        Some(Ok(chunk))
    }

    async fn close(&mut self) {
        self.guard.close();
    }
}

/// 由 seed（或 prompt）选一个 A 小调音阶上的音高
fn tone_frequency(request: &GenerationRequest) -> f32 {
    const SCALE: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];
    let key = request.seed().unwrap_or_else(|| {
        request
            .prompt()
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)))
    });
    let semitone = SCALE[(key % SCALE.len() as u32) as usize];
    220.0 * 2f32.powf(semitone as f32 / 12.0)
}
