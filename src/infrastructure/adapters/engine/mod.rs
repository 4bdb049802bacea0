//! Music Engine Adapter - 实时音乐生成引擎实现

mod fake_music_client;
mod lyria_client;
mod lyria_protocol;

pub use fake_music_client::{FakeMusicClient, ScriptedStep, ToneConfig};
pub use lyria_client::{LyriaClient, LyriaClientConfig};
