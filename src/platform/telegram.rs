use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, User};
use tracing::{error, info, warn};

use crate::memory::MessageKind;
use crate::platform::{Activity, ChatKind, IncomingMessage, ReplySink, SentMessage, Sender};
use crate::router::Router;

/// Run the Telegram bot platform.
///
/// teloxide hands updates of one chat to the endpoint in order and runs
/// different chats concurrently, which is all the ordering the router
/// needs.
pub async fn run(router: Arc<Router>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, router: Arc<Router>) -> ResponseResult<()> {
    let incoming = to_incoming(&msg);
    let sink = TelegramSink { bot };

    if let Err(e) = router.handle(&incoming, &sink).await {
        error!(
            "Failed to reply to message {} in chat {}: {:#}",
            incoming.message_id, incoming.chat_id, e
        );
    }

    Ok(())
}

fn sender_of(user: &User) -> Sender {
    Sender {
        id: user.id.0 as i64,
        username: user.username.clone(),
        display_name: Some(user.full_name()),
        is_bot: user.is_bot,
    }
}

fn to_incoming(msg: &Message) -> IncomingMessage {
    let (kind, file_id) = if let Some(photos) = msg.photo() {
        // the last size is the largest
        (
            MessageKind::Photo,
            photos.last().map(|p| p.file.id.to_string()),
        )
    } else if let Some(doc) = msg.document() {
        (MessageKind::Document, Some(doc.file.id.to_string()))
    } else {
        (MessageKind::Text, None)
    };

    let (text, is_caption) = match msg.text() {
        Some(t) => (Some(t.to_string()), false),
        None => (msg.caption().map(str::to_string), msg.caption().is_some()),
    };

    let chat_kind = if msg.chat.is_group() || msg.chat.is_supergroup() {
        ChatKind::Group
    } else if msg.chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Private
    };

    IncomingMessage {
        message_id: i64::from(msg.id.0),
        chat_id: msg.chat.id.0,
        chat_kind,
        sender: msg.from.as_ref().map(sender_of),
        kind,
        text,
        is_caption,
        file_id,
        reply_to: msg.reply_to_message().map(|m| i64::from(m.id.0)),
        timestamp: msg.date,
    }
}

fn sent(msg: &Message) -> SentMessage {
    SentMessage {
        message_id: i64::from(msg.id.0),
        timestamp: msg.date,
        from: msg.from.as_ref().map(sender_of),
    }
}

struct TelegramSink {
    bot: Bot,
}

#[async_trait]
impl ReplySink for TelegramSink {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<SentMessage> {
        let msg = self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(sent(&msg))
    }

    async fn send_photo(&self, chat_id: i64, bytes: Vec<u8>, caption: &str) -> Result<SentMessage> {
        let photo = InputFile::memory(bytes).file_name("art.png");
        let mut req = self.bot.send_photo(ChatId(chat_id), photo);
        if !caption.is_empty() {
            req = req.caption(caption);
        }
        let msg = req.await?;
        Ok(sent(&msg))
    }

    async fn send_document(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<SentMessage> {
        let doc = InputFile::memory(bytes).file_name(filename.to_string());
        let mut req = self.bot.send_document(ChatId(chat_id), doc);
        if !caption.is_empty() {
            req = req.caption(caption);
        }
        let msg = req.await?;
        Ok(sent(&msg))
    }

    async fn show_progress(&self, chat_id: i64, activity: Activity) {
        let action = match activity {
            Activity::Typing => ChatAction::Typing,
            Activity::UploadingPhoto => ChatAction::UploadPhoto,
        };
        self.bot
            .send_chat_action(ChatId(chat_id), action)
            .await
            .ok();
    }
}
