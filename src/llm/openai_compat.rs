//! Thin OpenAI-compatible `TextGeneration` adapter, trimmed from the pack's
//! `OpenAIBackend` (OpenAI / Azure / local constructors, chat-completions
//! request shape). Kept thin per SPEC_FULL.md §4.17: no SSE streaming, no
//! session reuse — `generate` only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResearchError;

use super::{FinishReason, GenerationOptions, GenerationOutcome, TextGeneration};

#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    api_version: Option<String>,
}

impl OpenAiCompatible {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("https://api.openai.com/v1", api_key, model, None)
    }

    pub fn azure(endpoint: impl Into<String>, api_key: impl Into<String>, deployment: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self::new(endpoint, api_key, deployment, Some(api_version.into()))
    }

    pub fn local(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(endpoint, "not-needed", model, None)
    }

    fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>, api_version: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
            api_version,
        }
    }

    fn chat_url(&self) -> String {
        match &self.api_version {
            Some(v) => format!("{}/openai/deployments/{}/chat/completions?api-version={}", self.endpoint.trim_end_matches('/'), self.model, v),
            None => format!("{}/chat/completions", self.endpoint.trim_end_matches('/')),
        }
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
        let mut headers = HeaderMap::new();
        if self.api_version.is_some() {
            if let Ok(v) = HeaderValue::from_str(&self.api_key) {
                headers.insert("api-key", v);
            }
        } else if let Ok(v) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, v);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[async_trait]
impl TextGeneration for OpenAiCompatible {
    async fn generate(&self, prompt: &str, opts: GenerationOptions) -> Result<GenerationOutcome, ResearchError> {
        let mut messages = Vec::new();
        if let Some(system) = &opts.system_prompt {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });

        let request = ChatRequest { model: &self.model, messages, max_tokens: opts.max_tokens, temperature: opts.temperature, stream: false };

        let response = self
            .client
            .post(self.chat_url())
            .headers(self.headers())
            .json(&request)
            .send()
            .await
            .map_err(ResearchError::from)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ResearchError::ProviderAuth { provider: "llm".to_string(), message: format!("http {status}") });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::Llm(format!("http {status}: {body}")));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| ResearchError::Llm(format!("malformed response: {e}")))?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| ResearchError::Llm("empty choices array".to_string()))?;

        let finish_reason = choice.finish_reason.as_deref().map(|r| match r {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            _ => FinishReason::Other,
        });

        Ok(GenerationOutcome { text: choice.message.content, token_usage: parsed.usage.map(|u| u.total_tokens), finish_reason })
    }
}
