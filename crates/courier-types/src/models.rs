use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of message content, in characters.
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Length the denormalized last-message preview is truncated to.
pub const PREVIEW_CHARS: usize = 100;

/// Sort two user ids into the canonical order used as the de-duplication
/// key for direct conversations. `pair(a, b)` and `pair(b, a)` are equal.
pub fn canonical_pair(a: Uuid, b: Uuid) -> [Uuid; 2] {
    if a <= b { [a, b] } else { [b, a] }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationKind {
    #[serde(rename = "DIRECT")]
    Direct,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    File,
}

/// DELIVERED is reserved for a future receipt hop and is never set today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub file_url: String,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

/// Denormalized snapshot of a conversation's most recent message.
/// `content` is truncated to [`PREVIEW_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub message_id: Uuid,
    pub content: String,
    pub sender_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Exactly two participants, stored in canonical (sorted) order.
    pub participants: [Uuid; 2],
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub message_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// The participant that is not `user_id`. Falls back to the first
    /// participant if `user_id` is not part of the conversation.
    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.participants[0] == user_id {
            self.participants[1]
        } else {
            self.participants[0]
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub status: MessageStatus,
    pub files: Vec<FileAttachment>,
    pub read_by: Vec<ReadReceipt>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Truncate a preview string to `PREVIEW_CHARS` characters without splitting
/// a code point.
pub fn preview_of(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}
