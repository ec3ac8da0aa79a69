//! Completion API client for the AI analysis feature.
//!
//! Supports OpenRouter (OpenAI-compatible chat completions) and Google Gemini
//! (`generateContent`). No other module talks to a provider directly.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;

pub mod prompts;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const MAX_TOKENS: u32 = 2048;
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenRouter,
    Gemini,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    provider: Provider,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let model = config.model.clone().unwrap_or_else(|| {
            match config.provider {
                Provider::OpenRouter => DEFAULT_OPENROUTER_MODEL,
                Provider::Gemini => DEFAULT_GEMINI_MODEL,
            }
            .to_string()
        });
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            provider: config.provider,
            api_key: config.api_key.clone(),
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one prompt and returns the generated text.
    /// Retries on 429, 5xx and transport errors with exponential backoff.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.request(prompt, system).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }

            let body: Value = response.json().await?;
            let text = extract_text(self.provider, body)?;
            debug!(
                "LLM call succeeded: model={}, chars={}",
                self.model,
                text.len()
            );
            return Ok(text);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    fn request(&self, prompt: &str, system: &str) -> reqwest::RequestBuilder {
        match self.provider {
            Provider::OpenRouter => self
                .client
                .post(OPENROUTER_API_URL)
                .bearer_auth(&self.api_key)
                .json(&chat_body(&self.model, prompt, system)),
            Provider::Gemini => self
                .client
                .post(format!("{GEMINI_API_BASE}/{}:generateContent", self.model))
                .header("x-goog-api-key", &self.api_key)
                .json(&gemini_body(prompt, system)),
        }
    }
}

fn chat_body<'a>(model: &'a str, prompt: &'a str, system: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        max_tokens: MAX_TOKENS,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
    }
}

fn gemini_body(prompt: &str, system: &str) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": system }] },
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": { "maxOutputTokens": MAX_TOKENS }
    })
}

/// Pulls the generated text out of a provider response body.
fn extract_text(provider: Provider, body: Value) -> Result<String, LlmError> {
    let text = match provider {
        Provider::OpenRouter => serde_json::from_value::<ChatResponse>(body)
            .ok()
            .and_then(|r| r.choices.into_iter().next())
            .and_then(|c| c.message.content),
        Provider::Gemini => serde_json::from_value::<GeminiResponse>(body)
            .ok()
            .and_then(|r| r.candidates.into_iter().next())
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            }),
    };
    text.filter(|t| !t.trim().is_empty())
        .ok_or(LlmError::EmptyContent)
}

/// Both providers nest the message under `error.message`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_openrouter_text() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "Looks strong."}}]});
        assert_eq!(
            extract_text(Provider::OpenRouter, body).unwrap(),
            "Looks strong."
        );
    }

    #[test]
    fn test_extract_gemini_text_joins_parts() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": "Part one. "}, {"text": "Part two."}]}}]});
        assert_eq!(
            extract_text(Provider::Gemini, body).unwrap(),
            "Part one. Part two."
        );
    }

    #[test]
    fn test_empty_response_is_error() {
        assert!(matches!(
            extract_text(Provider::OpenRouter, json!({"choices": []})),
            Err(LlmError::EmptyContent)
        ));
        assert!(matches!(
            extract_text(Provider::Gemini, json!({"candidates": [{"content": {"parts": [{"text": "  "}]}}]})),
            Err(LlmError::EmptyContent)
        ));
    }

    #[test]
    fn test_error_message_parsing() {
        assert_eq!(
            error_message(r#"{"error": {"message": "invalid key", "code": 401}}"#),
            "invalid key"
        );
        assert_eq!(error_message("gateway down"), "gateway down");
    }

    #[test]
    fn test_chat_body_has_system_then_user() {
        let body = serde_json::to_value(chat_body("m", "prompt", "sys")).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "prompt");
        assert_eq!(body["model"], "m");
    }

    #[test]
    fn test_default_model_per_provider() {
        let client = LlmClient::new(&LlmConfig {
            provider: Provider::Gemini,
            api_key: "k".to_string(),
            model: None,
        })
        .unwrap();
        assert_eq!(client.model(), DEFAULT_GEMINI_MODEL);
    }
}
