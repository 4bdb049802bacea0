//! Gemini Prompt Assistant - 调用 Gemini generateContent 改写 prompt
//!
//! POST {base_url}/v1beta/models/{model}:generateContent?key={api_key}
//! Request: {"contents": [{"parts": [{"text": "..."}]}]}
//! Response: {"candidates": [{"content": {"parts": [{"text": "..."}]}}]}

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{AssistantError, PromptAssistantPort};

const INSTRUCTION: &str = "Rewrite the following idea as a single prompt for an instrumental \
music generation model. Mention genre, instruments, mood and texture. \
Answer with the prompt only, at most 40 words, no quotes.\n\nIdea: ";

/// Gemini 客户端配置
#[derive(Debug, Clone)]
pub struct GeminiAssistantConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for GeminiAssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Gemini Prompt Assistant
pub struct GeminiPromptAssistant {
    client: Client,
    config: GeminiAssistantConfig,
}

impl GeminiPromptAssistant {
    pub fn new(config: GeminiAssistantConfig) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AssistantError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model.trim_start_matches("models/")
        )
    }
}

/// 取第一个候选的全部文本，去掉引号和多余空白
fn extract_prompt(response: GenerateContentResponse) -> Result<String, AssistantError> {
    let text = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .next()
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let cleaned = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string();

    if cleaned.is_empty() {
        return Err(AssistantError::InvalidResponse("empty completion".into()));
    }
    Ok(cleaned)
}

#[async_trait]
impl PromptAssistantPort for GeminiPromptAssistant {
    async fn optimize_prompt(&self, prompt: &str) -> Result<String, AssistantError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AssistantError::NotConfigured("GOOGLE_API_KEY is not set".into()))?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: format!("{}{}", INSTRUCTION, prompt),
                }],
            }],
        };

        tracing::debug!(model = %self.config.model, prompt_len = prompt.len(), "Requesting prompt rewrite");

        let response = self
            .client
            .post(self.generate_url())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AssistantError::NetworkError("request timed out".into())
                } else if e.is_connect() {
                    AssistantError::NetworkError(format!("Cannot connect to Gemini: {}", e))
                } else {
                    AssistantError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssistantError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::InvalidResponse(e.to_string()))?;

        extract_prompt(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url() {
        let assistant = GeminiPromptAssistant::new(GeminiAssistantConfig {
            base_url: "https://example.test/".into(),
            model: "models/gemini-2.0-flash".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            assistant.generate_url(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_extract_prompt_cleans_text() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"\"Warm lo-fi hip hop,\n dusty vinyl\"\n"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            extract_prompt(response).unwrap(),
            "Warm lo-fi hip hop, dusty vinyl"
        );
    }

    #[test]
    fn test_extract_prompt_rejects_empty() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(
            extract_prompt(response),
            Err(AssistantError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let assistant = GeminiPromptAssistant::new(GeminiAssistantConfig::default()).unwrap();
        assert!(matches!(
            assistant.optimize_prompt("jazz").await,
            Err(AssistantError::NotConfigured(_))
        ));
    }
}
