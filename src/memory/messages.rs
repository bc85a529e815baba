use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::str::FromStr;
use tracing::{debug, info};

use super::{MessageStore, Result};

/// What a logged message carried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Photo,
    Document,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Photo => "photo",
            MessageKind::Document => "document",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown message kind: {0}")]
pub struct UnknownKind(String);

impl FromStr for MessageKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "photo" => Ok(MessageKind::Photo),
            "document" => Ok(MessageKind::Document),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

impl ToSql for MessageKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MessageKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// One row of the message log
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    /// Provider-assigned, unique within its chat
    pub message_id: i64,
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub kind: MessageKind,
    /// Text body, or the caption of a photo/document
    pub content: Option<String>,
    pub file_id: Option<String>,
    pub reply_to: Option<i64>,
    pub is_bot: bool,
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    /// Name used when rendering the record into a transcript line
    pub fn speaker(&self) -> &str {
        self.username
            .as_deref()
            .or(self.display_name.as_deref())
            .unwrap_or("Anonymous")
    }
}

/// Shorten content for log lines without splitting a UTF-8 char
pub(crate) fn preview(content: &str) -> String {
    if content.chars().count() > 50 {
        let head: String = content.chars().take(47).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

impl MessageStore {
    /// Insert one record. Returns `false` if a record with the same
    /// (chat, message id) already exists; existing rows are never touched.
    pub async fn append(&self, record: &MessageRecord) -> Result<bool> {
        info!(
            "Storing message: ID={}, Type={}, User={}, Bot={}, Chat={}, Content='{}'",
            record.message_id,
            record.kind,
            record.username.as_deref().unwrap_or("-"),
            record.is_bot,
            record.chat_id,
            preview(record.content.as_deref().unwrap_or(""))
        );

        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO messages
             (chat_id, message_id, user_id, username, display_name, message_type,
              content, file_id, reply_to_message_id, is_bot, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                record.chat_id,
                record.message_id,
                record.user_id,
                &record.username,
                &record.display_name,
                record.kind,
                &record.content,
                &record.file_id,
                record.reply_to,
                record.is_bot,
                record.timestamp.timestamp(),
            ],
        )?;

        if inserted == 0 {
            debug!(
                "Message {} in chat {} already stored, ignoring",
                record.message_id, record.chat_id
            );
        }
        Ok(inserted > 0)
    }

    /// Records of one chat within `[since, until)`, oldest first, ties
    /// broken by message id.
    pub async fn query_range(
        &self,
        chat_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<MessageRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT message_id, chat_id, user_id, username, display_name, message_type,
                    content, file_id, reply_to_message_id, is_bot, date
             FROM messages
             WHERE chat_id = ?1 AND date >= ?2 AND date < ?3
             ORDER BY date ASC, message_id ASC",
        )?;

        let records = stmt
            .query_map(
                rusqlite::params![chat_id, since.timestamp(), until.timestamp()],
                parse_record_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(
            "Fetched {} message(s) for chat {} in [{}, {})",
            records.len(),
            chat_id,
            since,
            until
        );
        Ok(records)
    }

    /// Transcript lines (`name: content`) for a window, skipping records
    /// without text.
    pub async fn transcript(
        &self,
        chat_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let records = self.query_range(chat_id, since, until).await?;
        Ok(records
            .iter()
            .filter_map(|r| {
                let content = r.content.as_deref()?.trim();
                if content.is_empty() {
                    None
                } else {
                    Some(format!("{}: {}", r.speaker(), content))
                }
            })
            .collect())
    }
}

fn parse_record_row(row: &rusqlite::Row) -> rusqlite::Result<MessageRecord> {
    let date: i64 = row.get(10)?;
    Ok(MessageRecord {
        message_id: row.get(0)?,
        chat_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        display_name: row.get(4)?,
        kind: row.get(5)?,
        content: row.get(6)?,
        file_id: row.get(7)?,
        reply_to: row.get(8)?,
        is_bot: row.get(9)?,
        timestamp: DateTime::from_timestamp(date, 0).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(chat_id: i64, message_id: i64, secs: i64, content: &str) -> MessageRecord {
        MessageRecord {
            message_id,
            chat_id,
            user_id: Some(42),
            username: Some("alice".to_string()),
            display_name: Some("Alice".to_string()),
            kind: MessageKind::Text,
            content: Some(content.to_string()),
            file_id: None,
            reply_to: None,
            is_bot: false,
            timestamp: at(secs),
        }
    }

    #[tokio::test]
    async fn test_append_and_query_roundtrip() {
        let store = MessageStore::open_in_memory().unwrap();
        let rec = record(1, 10, 0, "hello");
        assert!(store.append(&rec).await.unwrap());

        let rows = store.query_range(1, at(0), at(1)).await.unwrap();
        assert_eq!(rows, vec![rec]);
    }

    #[tokio::test]
    async fn test_duplicate_is_ignored_not_replaced() {
        let store = MessageStore::open_in_memory().unwrap();
        assert!(store.append(&record(1, 10, 0, "first")).await.unwrap());
        assert!(!store.append(&record(1, 10, 5, "second")).await.unwrap());

        let rows = store.query_range(1, at(0), at(60)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_same_message_id_in_other_chat_is_distinct() {
        let store = MessageStore::open_in_memory().unwrap();
        assert!(store.append(&record(1, 10, 0, "a")).await.unwrap());
        assert!(store.append(&record(2, 10, 0, "b")).await.unwrap());

        let rows = store.query_range(2, at(0), at(1)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_query_range_is_half_open_and_ordered() {
        let store = MessageStore::open_in_memory().unwrap();
        // inserted out of order on purpose
        store.append(&record(1, 5, 20, "late")).await.unwrap();
        store.append(&record(1, 3, 10, "tie-b")).await.unwrap();
        store.append(&record(1, 2, 10, "tie-a")).await.unwrap();
        store.append(&record(1, 1, 0, "at-since")).await.unwrap();
        store.append(&record(1, 9, 30, "at-until")).await.unwrap();
        store.append(&record(1, 0, -1, "before")).await.unwrap();

        let rows = store.query_range(1, at(0), at(30)).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 5]);
        assert!(rows.iter().all(|r| r.timestamp >= at(0) && r.timestamp < at(30)));
    }

    #[tokio::test]
    async fn test_transcript_skips_empty_and_names_speakers() {
        let store = MessageStore::open_in_memory().unwrap();
        store.append(&record(1, 1, 0, "hi all")).await.unwrap();

        let mut photo = record(1, 2, 1, "");
        photo.kind = MessageKind::Photo;
        photo.file_id = Some("file-1".to_string());
        store.append(&photo).await.unwrap();

        let mut anon = record(1, 3, 2, "who am I");
        anon.username = None;
        anon.display_name = None;
        store.append(&anon).await.unwrap();

        let mut named = record(1, 4, 3, "just a name");
        named.username = None;
        store.append(&named).await.unwrap();

        let lines = store
            .transcript(1, at(0), at(0) + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(
            lines,
            vec!["alice: hi all", "Anonymous: who am I", "Alice: just a name"]
        );
    }

    #[tokio::test]
    async fn test_rows_cannot_be_updated() {
        let store = MessageStore::open_in_memory().unwrap();
        store.append(&record(1, 1, 0, "original")).await.unwrap();

        let conn = store.conn.lock().await;
        let res = conn.execute("UPDATE messages SET content = 'edited'", []);
        assert!(res.is_err());
        let res = conn.execute("DELETE FROM messages", []);
        assert!(res.is_err());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(60);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 50);
        assert_eq!(preview("short"), "short");
    }
}
