use crate::command::Command;
use crate::gateway::{truncate_chars, GatewayError, GatewayOutput};
use crate::memory::MessageKind;

pub const DENIED: &str = "You are not authorized to use this bot.";
pub const ADMIN_ONLY: &str = "You are not authorized to use this command.";
pub const GROUP_ONLY: &str = "This command can only be used in a group chat.";
pub const GROUP_ALREADY_ALLOWED: &str = "This group is already whitelisted.";
pub const GROUP_ALLOWED: &str =
    "Group has been successfully whitelisted. All members in this group can now use the bot.";

/// Telegram rejects longer text messages
const MAX_TEXT_LEN: usize = 4000;
/// Telegram rejects longer photo/document captions
const MAX_CAPTION_CHARS: usize = 1024;

/// One outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Photo {
        bytes: Vec<u8>,
        caption: String,
    },
    Document {
        bytes: Vec<u8>,
        filename: String,
        caption: String,
    },
}

impl Reply {
    /// Kind and text to log once the reply has been sent
    pub fn log_fields(&self) -> (MessageKind, Option<String>) {
        match self {
            Reply::Text(text) => (MessageKind::Text, Some(text.clone())),
            Reply::Photo { caption, .. } => (MessageKind::Photo, Some(caption.clone())),
            Reply::Document { caption, .. } => (MessageKind::Document, Some(caption.clone())),
        }
    }
}

/// Plain text, split into as many messages as Telegram needs
pub fn text(body: &str) -> Vec<Reply> {
    split_message(body, MAX_TEXT_LEN)
        .into_iter()
        .map(Reply::Text)
        .collect()
}

/// Turn a successful gateway call into replies
pub fn format_output(command: &Command, output: GatewayOutput) -> Vec<Reply> {
    match output {
        GatewayOutput::Image { bytes, caption } => vec![Reply::Photo {
            bytes,
            caption: caption_of(&caption),
        }],
        GatewayOutput::Text {
            text: body,
            attachment: Some(attachment),
        } => vec![Reply::Document {
            bytes: attachment.bytes,
            filename: attachment.filename,
            caption: caption_of(&body),
        }],
        GatewayOutput::Text {
            text: body,
            attachment: None,
        } => text(&body),
        GatewayOutput::Summary { text: summary } => text(&format!(
            "Summary of the past {} hour(s):\n\n{}",
            hours_of(command),
            summary
        )),
        GatewayOutput::EmptyWindow => text(&format!(
            "No messages found from the past {} hour(s).",
            hours_of(command)
        )),
    }
}

/// Generic notice for a failed gateway call; the cause is not shown
pub fn format_error(command: &Command, err: &GatewayError) -> Reply {
    let notice = match (command, err) {
        (_, GatewayError::RateLimited) => {
            "The service is busy right now. Please try again in a few minutes."
        }
        (Command::Art { .. }, _) => "Sorry, I couldn't generate the art. Please try again later.",
        (Command::Summarize { .. }, _) => "An error occurred while generating the summary.",
        _ => "An error occurred while processing your request.",
    };
    Reply::Text(notice.to_string())
}

fn hours_of(command: &Command) -> u32 {
    match command {
        Command::Summarize { hours } => *hours,
        _ => 0,
    }
}

fn caption_of(text: &str) -> String {
    truncate_chars(text, MAX_CAPTION_CHARS).to_string()
}

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Attachment;

    #[test]
    fn test_image_becomes_photo_with_caption() {
        let replies = format_output(
            &Command::Art {
                prompt: "a red fox in snow".into(),
            },
            GatewayOutput::Image {
                bytes: vec![1, 2, 3],
                caption: "a red fox in snow".into(),
            },
        );
        assert_eq!(
            replies,
            vec![Reply::Photo {
                bytes: vec![1, 2, 3],
                caption: "a red fox in snow".into()
            }]
        );
    }

    #[test]
    fn test_long_caption_is_truncated() {
        let replies = format_output(
            &Command::Art {
                prompt: "p".into(),
            },
            GatewayOutput::Image {
                bytes: vec![],
                caption: "ü".repeat(2000),
            },
        );
        match &replies[0] {
            Reply::Photo { caption, .. } => assert_eq!(caption.chars().count(), 1024),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn test_attachment_becomes_single_document() {
        let replies = format_output(
            &Command::Research { query: "q".into() },
            GatewayOutput::Text {
                text: "preview".into(),
                attachment: Some(Attachment {
                    filename: "answer.md".into(),
                    bytes: b"full".to_vec(),
                }),
            },
        );
        assert_eq!(
            replies,
            vec![Reply::Document {
                bytes: b"full".to_vec(),
                filename: "answer.md".into(),
                caption: "preview".into()
            }]
        );
    }

    #[test]
    fn test_summary_and_empty_window_mention_hours() {
        let cmd = Command::Summarize { hours: 5 };
        assert_eq!(
            format_output(&cmd, GatewayOutput::Summary { text: "s".into() }),
            vec![Reply::Text("Summary of the past 5 hour(s):\n\ns".into())]
        );
        assert_eq!(
            format_output(&cmd, GatewayOutput::EmptyWindow),
            vec![Reply::Text("No messages found from the past 5 hour(s).".into())]
        );
    }

    #[test]
    fn test_error_notice_hides_cause() {
        let reply = format_error(
            &Command::Research { query: "q".into() },
            &GatewayError::InvalidResponse("secret upstream detail".into()),
        );
        assert_eq!(
            reply,
            Reply::Text("An error occurred while processing your request.".into())
        );
        assert!(matches!(
            format_error(&Command::Art { prompt: "p".into() }, &GatewayError::Timeout),
            Reply::Text(t) if t.contains("couldn't generate the art")
        ));
    }

    #[test]
    fn test_split_message_short() {
        assert_eq!(split_message("hello", 4000), vec!["hello"]);
    }

    #[test]
    fn test_split_message_prefers_newlines() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{}\n", "a".repeat(30)));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_message_multibyte() {
        let text = "日本語".repeat(20);
        let chunks = split_message(&text, 10);
        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert_eq!(chunks.concat(), text);
    }
}
