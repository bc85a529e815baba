pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::memory::{MessageKind, MessageRecord};

/// Who sent a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub is_bot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Channel,
}

/// A message received from the messaging platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    /// `None` for channel posts
    pub sender: Option<Sender>,
    pub kind: MessageKind,
    /// Text body; for photos and documents, the caption
    pub text: Option<String>,
    /// True when `text` is a caption rather than a message body
    pub is_caption: bool,
    pub file_id: Option<String>,
    pub reply_to: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn to_record(&self) -> MessageRecord {
        MessageRecord {
            message_id: self.message_id,
            chat_id: self.chat_id,
            user_id: self.sender.as_ref().map(|s| s.id),
            username: self.sender.as_ref().and_then(|s| s.username.clone()),
            display_name: self.sender.as_ref().and_then(|s| s.display_name.clone()),
            kind: self.kind,
            content: self.text.clone(),
            file_id: self.file_id.clone(),
            reply_to: self.reply_to,
            is_bot: self.sender.as_ref().is_some_and(|s| s.is_bot),
            timestamp: self.timestamp,
        }
    }

    /// Text that may carry a command; captions never do
    pub fn command_text(&self) -> Option<&str> {
        if self.is_caption {
            None
        } else {
            self.text.as_deref()
        }
    }
}

/// A message the platform accepted on our behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: i64,
    pub timestamp: DateTime<Utc>,
    /// The bot account as the platform reports it
    pub from: Option<Sender>,
}

/// What the bot is busy doing, for the platform's progress indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Typing,
    UploadingPhoto,
}

/// Outbound half of a messaging platform
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<SentMessage>;

    async fn send_photo(&self, chat_id: i64, bytes: Vec<u8>, caption: &str)
        -> Result<SentMessage>;

    async fn send_document(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<SentMessage>;

    /// Best effort; failures are ignored
    async fn show_progress(&self, _chat_id: i64, _activity: Activity) {}
}
