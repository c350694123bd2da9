//! Database row types — these map directly to SQLite rows.
//! Distinct from the courier-types wire models to keep the DB layer
//! independent; conversion happens here.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use courier_types::models::{
    Conversation, ConversationKind, LastMessage, MessageStatus, MessageType,
};

use crate::{Result, StoreError};

pub struct ConversationRow {
    pub id: String,
    pub participant_low: String,
    pub participant_high: String,
    pub message_count: i64,
    pub last_message_id: Option<String>,
    pub last_message_content: Option<String>,
    pub last_message_sender_id: Option<String>,
    pub last_message_sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct UploadRow {
    pub id: String,
    pub owner_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: String,
}

impl ConversationRow {
    pub fn into_conversation(self) -> Result<Conversation> {
        let last_message = match (
            self.last_message_id,
            self.last_message_content,
            self.last_message_sender_id,
            self.last_message_sent_at,
        ) {
            (Some(id), Some(content), Some(sender), Some(sent_at)) => Some(LastMessage {
                message_id: parse_uuid(&id)?,
                content,
                sender_id: parse_uuid(&sender)?,
                sent_at: parse_time(&sent_at)?,
            }),
            _ => None,
        };

        Ok(Conversation {
            id: parse_uuid(&self.id)?,
            participants: [
                parse_uuid(&self.participant_low)?,
                parse_uuid(&self.participant_high)?,
            ],
            kind: ConversationKind::Direct,
            message_count: self.message_count.max(0) as u64,
            last_message,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

/// Fixed-width UTC timestamp so lexicographic order in SQLite matches
/// chronological order.
pub(crate) fn time_string(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

pub(crate) fn now_string() -> String {
    time_string(Utc::now())
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse()
        .map_err(|_| StoreError::Corrupt(format!("bad uuid '{s}'")))
}

pub(crate) fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    // Fast path: RFC 3339. Fallback covers SQLite's bare datetime format.
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|_| StoreError::Corrupt(format!("bad timestamp '{s}'")))
}

pub(crate) fn parse_message_type(s: &str) -> Result<MessageType> {
    match s {
        "TEXT" => Ok(MessageType::Text),
        "IMAGE" => Ok(MessageType::Image),
        "VIDEO" => Ok(MessageType::Video),
        "FILE" => Ok(MessageType::File),
        other => Err(StoreError::Corrupt(format!("bad message type '{other}'"))),
    }
}

pub(crate) fn message_type_str(t: MessageType) -> &'static str {
    match t {
        MessageType::Text => "TEXT",
        MessageType::Image => "IMAGE",
        MessageType::Video => "VIDEO",
        MessageType::File => "FILE",
    }
}

pub(crate) fn parse_status(s: &str) -> Result<MessageStatus> {
    match s {
        "SENT" => Ok(MessageStatus::Sent),
        "DELIVERED" => Ok(MessageStatus::Delivered),
        "READ" => Ok(MessageStatus::Read),
        other => Err(StoreError::Corrupt(format!("bad status '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_string_round_trips_and_sorts() {
        let a = Utc::now();
        let b = a + chrono::Duration::microseconds(1);
        let (sa, sb) = (time_string(a), time_string(b));
        assert!(sa < sb);
        // Serialization truncates to microseconds.
        assert_eq!(
            parse_time(&sa).unwrap().timestamp_micros(),
            a.timestamp_micros()
        );
    }

    #[test]
    fn sqlite_datetime_fallback_parses() {
        assert!(parse_time("2026-08-06 10:00:00").is_ok());
        assert!(parse_time("definitely not a date").is_err());
    }
}
