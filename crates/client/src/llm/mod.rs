//! Page analysis through an OpenAI-compatible chat completion endpoint.
//!
//! - **Endpoint**: `{base_url}/chat/completions`
//! - **Authentication**: optional `Authorization: Bearer` header.
//! - Non-streaming; the first choice's message content is the analysis.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use linkdigest_core::config::LlmConfig;
use linkdigest_core::{Analyzer, Error, ExtractedPage};

const SYSTEM_PROMPT: &str = "You summarize web pages for a chat audience. \
Reply with a short overview, the key points as a bullet list, and one line on who the page is useful for. \
Do not invent facts that are not in the page.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Build the user message for a page.
fn page_prompt(page: &ExtractedPage) -> String {
    format!(
        "Title: {}\nURL: {}\n\nContent:\n{}",
        page.title.as_deref().unwrap_or("(none)"),
        page.url,
        page.content
    )
}

/// [`Analyzer`] backed by a chat completion API.
pub struct ChatAnalyzer {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl ChatAnalyzer {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::LlmFailed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Analyzer for ChatAnalyzer {
    async fn analyze(&self, page: &ExtractedPage) -> Result<String, Error> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: page_prompt(page) },
            ],
            max_tokens: self.max_tokens,
            temperature: 0.3,
            stream: false,
        };

        let mut builder = self.http.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::LlmFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::LlmFailed(format!("status {}", status.as_u16())));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LlmFailed(format!("invalid response: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::LlmFailed("empty completion".into()))?;

        tracing::debug!(url = %page.url, model = %self.model, chars = content.len(), "analysis complete");
        Ok(content)
    }
}
