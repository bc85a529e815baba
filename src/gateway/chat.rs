use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{check_status, request_error};
use super::{GatewayError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    /// Perplexity extension: source URLs referenced as `[n]`
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// A single completion plus any sources the provider attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub citations: Vec<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
        }
    }

    /// Send one user message and return the first choice
    pub async fn complete(&self, prompt: &str) -> Result<Completion> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            max_tokens: self.max_tokens,
            temperature: 0.7,
            top_p: 0.95,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!("Sending chat request to {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let response = check_status(response).await?;

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("chat response: {e}")))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GatewayError::InvalidResponse("no completion returned".to_string()))?;

        Ok(Completion {
            content,
            citations: chat_response.citations,
        })
    }
}
