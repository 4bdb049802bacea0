//! Generation Context - Value Objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::RequestError;

/// 默认节拍
pub const DEFAULT_BPM: u32 = 120;

/// Lyria 接受的 temperature 范围
pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 3.0;

/// 生成请求
///
/// 不变量:
/// - prompt 去除首尾空白后非空
/// - duration_secs > 0
/// - duration_secs 对应的 PCM 能装进 WAV 的 u32 长度字段
/// - bpm > 0
/// - temperature（如有）在 [MIN_TEMPERATURE, MAX_TEMPERATURE] 内
///
/// 提交后不可修改，历史记录中保存的字段与提交时完全一致。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    prompt: String,
    duration_secs: u32,
    bpm: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<String>,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        duration_secs: u32,
        bpm: u32,
    ) -> Result<Self, RequestError> {
        let request = Self {
            prompt: prompt.into().trim().to_string(),
            duration_secs,
            bpm,
            seed: None,
            temperature: None,
            style: None,
        };
        request.validate()?;
        Ok(request)
    }

    /// 替换 prompt（例如改写后的版本），其余参数保持不变
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Result<Self, RequestError> {
        self.prompt = prompt.into().trim().to_string();
        self.validate()?;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: Option<u32>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Result<Self, RequestError> {
        self.temperature = temperature;
        self.validate()?;
        Ok(self)
    }

    /// 附加风格描述，空白字符串视为未设置
    pub fn with_style(mut self, style: Option<String>) -> Self {
        self.style = style
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    /// 校验全部不变量
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.prompt.trim().is_empty() {
            return Err(RequestError::EmptyPrompt);
        }
        if self.duration_secs == 0 {
            return Err(RequestError::InvalidDuration(self.duration_secs));
        }
        let max = AudioSpec::LYRIA.max_wav_duration_secs();
        if self.duration_secs > max {
            return Err(RequestError::DurationTooLong {
                secs: self.duration_secs,
                max,
            });
        }
        if self.bpm == 0 {
            return Err(RequestError::InvalidBpm(self.bpm));
        }
        if let Some(value) = self.temperature {
            if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&value) {
                return Err(RequestError::InvalidTemperature {
                    value,
                    min: MIN_TEMPERATURE,
                    max: MAX_TEMPERATURE,
                });
            }
        }
        Ok(())
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn seed(&self) -> Option<u32> {
        self.seed
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    /// 目标时长
    pub fn target_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_secs))
    }
}

/// 音频格式（交错存储的整数 PCM）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioSpec {
    /// Lyria RealTime 输出格式: 48kHz / 立体声 / 16 位
    pub const LYRIA: AudioSpec = AudioSpec {
        sample_rate: 48_000,
        channels: 2,
        bits_per_sample: 16,
    };

    /// 每帧字节数
    pub fn block_align(&self) -> u32 {
        u32::from(self.channels) * u32::from(self.bits_per_sample / 8)
    }

    pub fn bytes_per_second(&self) -> u64 {
        u64::from(self.sample_rate) * u64::from(self.block_align())
    }

    /// 按字节数推算时长
    pub fn duration_of(&self, bytes: u64) -> Duration {
        let bytes_per_second = self.bytes_per_second();
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        let nanos = u128::from(bytes) * 1_000_000_000 / u128::from(bytes_per_second);
        Duration::from_nanos(nanos as u64)
    }

    /// 指定秒数对应的字节数（天然按帧对齐）
    pub fn bytes_for(&self, duration_secs: u32) -> u64 {
        u64::from(duration_secs) * self.bytes_per_second()
    }

    /// RIFF 长度字段为 u32，文件头之外还要留出 36 字节
    pub fn max_wav_duration_secs(&self) -> u32 {
        let bytes_per_second = self.bytes_per_second();
        if bytes_per_second == 0 {
            return u32::MAX;
        }
        let max = (u64::from(u32::MAX) - 36) / bytes_per_second;
        u32::try_from(max).unwrap_or(u32::MAX)
    }
}

/// 产物文件格式
///
/// 流始终先拼成 WAV，MP3 由外部编码器转换
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }

    /// 按扩展名推断，未知扩展名按 WAV 处理
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("mp3") => OutputFormat::Mp3,
            _ => OutputFormat::Wav,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            _ => Err(RequestError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self::LYRIA
    }
}

/// 音频流片段
///
/// sequence 按到达顺序从 0 开始分配，拼接时不重排、不去重。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub sequence: u64,
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(sequence: u64, data: Vec<u8>) -> Self {
        Self { sequence, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_trimmed() {
        let request = GenerationRequest::new("  lofi beats \n", 5, 90).unwrap();
        assert_eq!(request.prompt(), "lofi beats");
        assert_eq!(request.bpm(), 90);
    }

    #[test]
    fn test_rejects_blank_prompt() {
        assert_eq!(
            GenerationRequest::new("   ", 5, 120),
            Err(RequestError::EmptyPrompt)
        );
    }

    #[test]
    fn test_rejects_zero_duration_and_bpm() {
        assert_eq!(
            GenerationRequest::new("x", 0, 120),
            Err(RequestError::InvalidDuration(0))
        );
        assert_eq!(
            GenerationRequest::new("x", 5, 0),
            Err(RequestError::InvalidBpm(0))
        );
    }

    #[test]
    fn test_rejects_duration_beyond_wav_limit() {
        let max = AudioSpec::LYRIA.max_wav_duration_secs();
        assert_eq!(max, 22_369);
        assert!(GenerationRequest::new("x", max, 120).is_ok());
        assert_eq!(
            GenerationRequest::new("x", max + 1, 120),
            Err(RequestError::DurationTooLong {
                secs: max + 1,
                max
            })
        );
        assert!(AudioSpec::LYRIA.bytes_for(max) + 36 <= u64::from(u32::MAX));
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("MP3".parse::<OutputFormat>(), Ok(OutputFormat::Mp3));
        assert_eq!("wav".parse::<OutputFormat>(), Ok(OutputFormat::Wav));
        assert!("ogg".parse::<OutputFormat>().is_err());
        assert_eq!(
            OutputFormat::from_path(Path::new("/music/a.MP3")),
            OutputFormat::Mp3
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("/music/a.wav")),
            OutputFormat::Wav
        );
    }

    #[test]
    fn test_temperature_range() {
        let request = GenerationRequest::new("x", 5, 120).unwrap();
        assert!(request.clone().with_temperature(Some(1.5)).is_ok());
        assert!(matches!(
            request.with_temperature(Some(4.0)),
            Err(RequestError::InvalidTemperature { .. })
        ));
    }

    #[test]
    fn test_blank_style_is_dropped() {
        let request = GenerationRequest::new("x", 5, 120)
            .unwrap()
            .with_style(Some("  ".to_string()));
        assert_eq!(request.style(), None);
    }

    #[test]
    fn test_lyria_spec_math() {
        let spec = AudioSpec::LYRIA;
        assert_eq!(spec.block_align(), 4);
        assert_eq!(spec.bytes_per_second(), 192_000);
        assert_eq!(spec.bytes_for(5), 960_000);
        assert_eq!(spec.duration_of(96_000), Duration::from_millis(500));
        assert_eq!(spec.bytes_for(5) % u64::from(spec.block_align()), 0);
    }
}
