//! Encoder Adapter - 调用外部编码器转换产物格式

mod ffmpeg_encoder;

pub use ffmpeg_encoder::FfmpegEncoder;
