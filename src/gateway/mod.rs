//! Uniform front for the remote AI services.
//!
//! Each command becomes exactly one [`GatewayRequest`]; the [`Gateway`]
//! turns it into at most one remote call and a typed [`GatewayOutput`].

pub mod art;
pub mod chat;
pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::memory::{MessageStore, StoreError};

pub use http::HttpServices;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("remote service timed out")]
    Timeout,

    #[error("remote service is rate limiting us")]
    RateLimited,

    #[error("remote service returned HTTP {0}")]
    Upstream(u16),

    #[error("invalid response from remote service: {0}")]
    InvalidResponse(String),

    #[error("could not reach remote service: {0}")]
    Transport(String),

    #[error("could not read transcript window: {0}")]
    Transcript(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayRequest {
    Art {
        prompt: String,
    },
    Research {
        query: String,
    },
    Summarize {
        chat_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutput {
    Image { bytes: Vec<u8>, caption: String },
    Text {
        text: String,
        attachment: Option<Attachment>,
    },
    Summary { text: String },
    /// Nothing was said in the window; no remote call was made
    EmptyWindow,
}

/// Answer from the web-research service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchAnswer {
    pub text: String,
    /// Source URLs; `[n]` markers in `text` refer to entry `n - 1`
    pub citations: Vec<String>,
}

/// The remote endpoints themselves
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>>;
    async fn research(&self, query: &str) -> Result<ResearchAnswer>;
    async fn summarize(&self, transcript: &str) -> Result<String>;
}

const ATTACHMENT_NAME: &str = "answer.md";
const PREVIEW_CHARS: usize = 500;

pub struct Gateway {
    service: Arc<dyn RemoteService>,
    store: MessageStore,
    max_inline_chars: usize,
    max_transcript_chars: usize,
}

impl Gateway {
    pub fn new(
        service: Arc<dyn RemoteService>,
        store: MessageStore,
        max_inline_chars: usize,
        max_transcript_chars: usize,
    ) -> Self {
        Self {
            service,
            store,
            max_inline_chars,
            max_transcript_chars,
        }
    }

    pub async fn invoke(&self, request: GatewayRequest) -> Result<GatewayOutput> {
        match request {
            GatewayRequest::Art { prompt } => {
                info!("Generating art for prompt: {}", truncate_chars(&prompt, 100));
                let bytes = self.service.generate_image(&prompt).await?;
                info!("Art generation returned {} bytes", bytes.len());
                Ok(GatewayOutput::Image {
                    bytes,
                    caption: prompt,
                })
            }
            GatewayRequest::Research { query } => {
                info!("Research query: {}", truncate_chars(&query, 100));
                let answer = self.service.research(&query).await?;
                Ok(self.research_output(&answer))
            }
            GatewayRequest::Summarize {
                chat_id,
                since,
                until,
            } => {
                let lines = self.store.transcript(chat_id, since, until).await?;
                if lines.is_empty() {
                    info!("Nothing to summarize in chat {}", chat_id);
                    return Ok(GatewayOutput::EmptyWindow);
                }

                let joined = lines.join("\n");
                let transcript = tail_chars(&joined, self.max_transcript_chars);
                debug!(
                    "Summarizing {} line(s), {} chars for chat {}",
                    lines.len(),
                    transcript.chars().count(),
                    chat_id
                );
                let text = self.service.summarize(transcript).await?;
                Ok(GatewayOutput::Summary { text })
            }
        }
    }

    fn research_output(&self, answer: &ResearchAnswer) -> GatewayOutput {
        let text = with_citations(answer);
        if text.chars().count() <= self.max_inline_chars {
            return GatewayOutput::Text {
                text,
                attachment: None,
            };
        }

        let preview = format!(
            "{}...\n\n(Full answer attached as {})",
            truncate_chars(&text, PREVIEW_CHARS),
            ATTACHMENT_NAME
        );
        GatewayOutput::Text {
            text: preview,
            attachment: Some(Attachment {
                filename: ATTACHMENT_NAME.to_string(),
                bytes: text.into_bytes(),
            }),
        }
    }
}

/// Append the sources the answer actually cites, as a numbered list
pub fn with_citations(answer: &ResearchAnswer) -> String {
    let cited: Vec<String> = answer
        .citations
        .iter()
        .enumerate()
        .filter(|(i, _)| answer.text.contains(&format!("[{}]", i + 1)))
        .map(|(i, url)| format!("{}. {}", i + 1, url))
        .collect();

    if cited.is_empty() {
        answer.text.clone()
    } else {
        format!("{}\n\n{}", answer.text, cited.join("\n"))
    }
}

/// First `max` chars of `text`
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `max` chars of `text`
fn tail_chars(text: &str, max: usize) -> &str {
    let total = text.chars().count();
    if total <= max {
        return text;
    }
    match text.char_indices().nth(total - max) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
