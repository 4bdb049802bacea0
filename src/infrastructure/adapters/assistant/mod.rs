//! Prompt Assistant Adapter

mod gemini_assistant;

pub use gemini_assistant::{GeminiAssistantConfig, GeminiPromptAssistant};
