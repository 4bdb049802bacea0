//! Playback Adapter - 本地音频播放

mod command_player;

pub use command_player::{CommandAudioPlayer, KNOWN_PLAYERS};
pub(crate) use command_player::find_executable;
