//! Async LLM client
//!
//! Speaks either the Anthropic messages API or an OpenAI-compatible chat
//! completions API, picked from the endpoint URL. The client only moves
//! text: prompts come from `policy::llm`, parsing lives in `llm::parser`.

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use crate::core::error::{CivError, Result};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Wire dialect of the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

impl ApiFormat {
    fn for_url(url: &str) -> Self {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }
}

pub struct LlmClient {
    http: Client,
    api_key: String,
    api_url: String,
    model: String,
    format: ApiFormat,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            http: Client::new(),
            format: ApiFormat::for_url(&api_url),
            api_key,
            api_url,
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build from `LLM_API_KEY` (required), `LLM_API_URL` and `LLM_MODEL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| CivError::LlmError("LLM_API_KEY not set".into()))?;
        let api_url = std::env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        Ok(Self::new(api_key, api_url, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn format(&self) -> ApiFormat {
        self.format
    }

    /// One system + user exchange; returns the first text block of the reply
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = self.request(system, user);
        let response = request.send().await.map_err(llm_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CivError::LlmError(format!("API error {}: {}", status, body)));
        }

        let text = match self.format {
            ApiFormat::Anthropic => response
                .json::<AnthropicResponse>()
                .await
                .map_err(llm_error)?
                .content
                .into_iter()
                .next()
                .map(|block| block.text),
            ApiFormat::OpenAI => response
                .json::<ChatResponse>()
                .await
                .map_err(llm_error)?
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content),
        };
        text.ok_or_else(|| CivError::LlmError("Empty response".into()))
    }

    fn request(&self, system: &str, user: &str) -> RequestBuilder {
        let post = self
            .http
            .post(&self.api_url)
            .header("content-type", "application/json");
        match self.format {
            ApiFormat::Anthropic => post
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&AnthropicRequest {
                    model: &self.model,
                    max_tokens: self.max_tokens,
                    system,
                    messages: vec![Turn { role: "user", content: user }],
                }),
            ApiFormat::OpenAI => post.bearer_auth(&self.api_key).json(&ChatRequest {
                model: &self.model,
                max_tokens: self.max_tokens,
                messages: vec![
                    Turn {
                        role: "system",
                        content: system,
                    },
                    Turn { role: "user", content: user },
                ],
            }),
        }
    }
}

fn llm_error(e: reqwest::Error) -> CivError {
    CivError::LlmError(e.to_string())
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Turn<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<TextBlock>,
}

#[derive(Deserialize)]
struct TextBlock {
    text: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Turn<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_follows_url() {
        let anthropic = LlmClient::new("k".into(), DEFAULT_API_URL.into(), "m".into());
        assert_eq!(anthropic.format(), ApiFormat::Anthropic);
        let other = LlmClient::new(
            "k".into(),
            "https://api.deepseek.com/chat/completions".into(),
            "deepseek-chat".into(),
        );
        assert_eq!(other.format(), ApiFormat::OpenAI);
    }

    #[test]
    fn test_max_tokens_override() {
        let client = LlmClient::new("k".into(), "https://api.example.com".into(), "m".into())
            .with_max_tokens(512);
        assert_eq!(client.max_tokens, 512);
        assert_eq!(client.model(), "m");
    }

    #[test]
    fn test_anthropic_body_shape() {
        let body = AnthropicRequest {
            model: "m",
            max_tokens: 16,
            system: "be brief",
            messages: vec![Turn { role: "user", content: "hi" }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["system"], "be brief");
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_llm_error() {
        let client = LlmClient::new("k".into(), "http://127.0.0.1:9/v1".into(), "m".into());
        let err = client.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, CivError::LlmError(_)));
    }
}
