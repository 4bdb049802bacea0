//! Storage Adapter - 产物文件存储

mod file_storage;

pub use file_storage::{encode_wav_header, FileArtifactStorage, WAV_HEADER_LEN};
pub(crate) use file_storage::sibling_temp_path;
