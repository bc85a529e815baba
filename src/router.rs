use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::access::{Authority, Grant};
use crate::command::{self, Command, UsageError, HELP_TEXT};
use crate::gateway::{Gateway, GatewayRequest};
use crate::memory::{messages::preview, MessageRecord, MessageStore};
use crate::platform::{Activity, ChatKind, IncomingMessage, ReplySink, Sender};
use crate::reply::{self, Reply};

/// The platform-agnostic core: log every message, then authorize and run
/// the commands among them.
pub struct Router {
    store: MessageStore,
    authority: Arc<Authority>,
    gateway: Gateway,
    default_hours: u32,
}

impl Router {
    pub fn new(
        store: MessageStore,
        authority: Arc<Authority>,
        gateway: Gateway,
        default_hours: u32,
    ) -> Self {
        Self {
            store,
            authority,
            gateway,
            default_hours,
        }
    }

    /// Handle one inbound message. Only failures of the sink itself are
    /// returned; everything else becomes a reply or a log line.
    pub async fn handle(&self, msg: &IncomingMessage, sink: &dyn ReplySink) -> Result<()> {
        if let Err(e) = self.store.append(&msg.to_record()).await {
            error!(
                "Failed to store message {} in chat {}: {}",
                msg.message_id, msg.chat_id, e
            );
        }

        let Some(text) = msg.command_text() else {
            return Ok(());
        };

        let parsed = command::parse(text, self.default_hours);
        if matches!(parsed, Ok(Command::Unrecognized)) {
            return Ok(());
        }
        if matches!(parsed, Ok(Command::Help)) {
            return self.deliver(msg.chat_id, reply::text(HELP_TEXT), sink).await;
        }

        let Some(sender) = msg.sender.as_ref() else {
            warn!("Ignoring command without a sender in chat {}", msg.chat_id);
            return Ok(());
        };

        if !self.authority.is_authorized(sender, msg.chat_id).await {
            warn!(
                "Unauthorized command from user {} ({}) in chat {}: {}",
                sender.id,
                sender.username.as_deref().unwrap_or("-"),
                msg.chat_id,
                preview(text)
            );
            return self
                .deliver(msg.chat_id, vec![Reply::Text(reply::DENIED.to_string())], sink)
                .await;
        }

        let replies = match parsed {
            Err(UsageError::MissingUsers) if !self.authority.is_admin(sender).await => {
                warn!("Non-admin user {} tried to use /whitelist", sender.id);
                vec![Reply::Text(reply::ADMIN_ONLY.to_string())]
            }
            Err(usage) => self.usage_reply(&usage),
            Ok(command) => self.execute(msg, sender, command, sink).await,
        };
        self.deliver(msg.chat_id, replies, sink).await
    }

    fn usage_reply(&self, usage: &UsageError) -> Vec<Reply> {
        info!("Usage error: {:?}", usage);
        vec![Reply::Text(usage.to_string())]
    }

    async fn execute(
        &self,
        msg: &IncomingMessage,
        sender: &Sender,
        command: Command,
        sink: &dyn ReplySink,
    ) -> Vec<Reply> {
        info!(
            "Processing /{} from user {} in chat {}",
            command.name(),
            sender.id,
            msg.chat_id
        );

        let (request, activity) = match &command {
            Command::Art { prompt } => (
                GatewayRequest::Art {
                    prompt: prompt.clone(),
                },
                Activity::UploadingPhoto,
            ),
            Command::Research { query } => (
                GatewayRequest::Research {
                    query: query.clone(),
                },
                Activity::Typing,
            ),
            Command::Summarize { hours } => {
                let since = chrono::TimeDelta::try_hours(i64::from(*hours))
                    .and_then(|window| msg.timestamp.checked_sub_signed(window));
                let Some(since) = since else {
                    return self.usage_reply(&UsageError::InvalidHours(hours.to_string()));
                };
                (
                    GatewayRequest::Summarize {
                        chat_id: msg.chat_id,
                        since,
                        until: msg.timestamp,
                    },
                    Activity::Typing,
                )
            }
            Command::Whitelist { entries } => return self.whitelist(sender, entries).await,
            Command::WhitelistGroup => return self.whitelist_group(msg, sender).await,
            Command::Help => return reply::text(HELP_TEXT),
            Command::Unrecognized => return Vec::new(),
        };

        sink.show_progress(msg.chat_id, activity).await;

        match self.gateway.invoke(request).await {
            Ok(output) => reply::format_output(&command, output),
            Err(e) => {
                error!("/{} failed in chat {}: {}", command.name(), msg.chat_id, e);
                vec![reply::format_error(&command, &e)]
            }
        }
    }

    async fn whitelist(&self, sender: &Sender, entries: &[String]) -> Vec<Reply> {
        if !self.authority.is_admin(sender).await {
            warn!("Non-admin user {} tried to use /whitelist", sender.id);
            return vec![Reply::Text(reply::ADMIN_ONLY.to_string())];
        }

        let mut added = Vec::new();
        for entry in entries {
            let grant = match entry.parse::<i64>() {
                Ok(id) => Grant::User(id),
                Err(_) => Grant::Username(entry.clone()),
            };
            match self.authority.authorize(grant).await {
                Ok(true) => added.push(entry.trim_start_matches('@').to_string()),
                Ok(false) => {}
                Err(e) => {
                    error!("Granted {} but could not persist the allow-list: {}", entry, e);
                    added.push(entry.trim_start_matches('@').to_string());
                }
            }
        }

        let text = if added.is_empty() {
            "No new users were added to the whitelist.".to_string()
        } else {
            format!("Whitelisted users added: {}", added.join(", "))
        };
        vec![Reply::Text(text)]
    }

    async fn whitelist_group(&self, msg: &IncomingMessage, sender: &Sender) -> Vec<Reply> {
        if msg.chat_kind != ChatKind::Group {
            return vec![Reply::Text(reply::GROUP_ONLY.to_string())];
        }
        if !self.authority.is_admin(sender).await {
            warn!("Non-admin user {} tried to use /whitelist_group", sender.id);
            return vec![Reply::Text(reply::ADMIN_ONLY.to_string())];
        }

        let text = match self.authority.authorize(Grant::Group(msg.chat_id)).await {
            Ok(false) => reply::GROUP_ALREADY_ALLOWED,
            Ok(true) => reply::GROUP_ALLOWED,
            Err(e) => {
                error!(
                    "Granted group {} but could not persist the allow-list: {}",
                    msg.chat_id, e
                );
                reply::GROUP_ALLOWED
            }
        };
        vec![Reply::Text(text.to_string())]
    }

    /// Send replies in order and log each one the platform accepted
    async fn deliver(&self, chat_id: i64, replies: Vec<Reply>, sink: &dyn ReplySink) -> Result<()> {
        for reply in replies {
            let (kind, content) = reply.log_fields();
            let sent = match reply {
                Reply::Text(text) => sink.send_text(chat_id, &text).await?,
                Reply::Photo { bytes, caption } => sink.send_photo(chat_id, bytes, &caption).await?,
                Reply::Document {
                    bytes,
                    filename,
                    caption,
                } => {
                    sink.send_document(chat_id, bytes, &filename, &caption)
                        .await?
                }
            };

            let record = MessageRecord {
                message_id: sent.message_id,
                chat_id,
                user_id: sent.from.as_ref().map(|s| s.id),
                username: sent.from.as_ref().and_then(|s| s.username.clone()),
                display_name: sent.from.as_ref().and_then(|s| s.display_name.clone()),
                kind,
                content,
                file_id: None,
                reply_to: None,
                is_bot: true,
                timestamp: sent.timestamp,
            };
            if let Err(e) = self.store.append(&record).await {
                error!("Failed to store bot reply {}: {}", sent.message_id, e);
            }
        }
        Ok(())
    }
}
