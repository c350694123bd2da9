use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use courier_types::models::{
    Conversation, FileAttachment, LastMessage, Message, MessageStatus, MessageType, canonical_pair,
};

/// Identifier for an entry in the local conversation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvKey {
    /// Server-assigned conversation id.
    Server(Uuid),
    /// Locally synthesized id, held until the first send promotes the entry
    /// to the authoritative server conversation.
    Temp(Uuid),
}

impl ConvKey {
    pub fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }

    pub fn server_id(&self) -> Option<Uuid> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Temp(_) => None,
        }
    }
}

/// Local delivery state of a message bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Inserted optimistically; not yet confirmed by the server.
    Pending,
    Sent,
    Read,
}

impl From<MessageStatus> for Delivery {
    fn from(status: MessageStatus) -> Self {
        match status {
            MessageStatus::Sent | MessageStatus::Delivered => Delivery::Sent,
            MessageStatus::Read => Delivery::Read,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalMessage {
    /// Server id once confirmed; a client-generated temporary id while
    /// PENDING. Temporary ids are never known server-side.
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub files: Vec<FileAttachment>,
    pub created_at: DateTime<Utc>,
    pub delivery: Delivery,
}

impl LocalMessage {
    pub fn from_server(message: &Message) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            message_type: message.message_type,
            files: message.files.clone(),
            created_at: message.created_at,
            delivery: message.status.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub key: ConvKey,
    pub participants: [Uuid; 2],
    pub message_count: u64,
    pub last_message: Option<LastMessage>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationEntry {
    fn from_server(conversation: &Conversation) -> Self {
        Self {
            key: ConvKey::Server(conversation.id),
            participants: conversation.participants,
            message_count: conversation.message_count,
            last_message: conversation.last_message.clone(),
            updated_at: conversation.updated_at,
        }
    }
}

/// A recoverable failure surfaced to the user. `content` carries the typed
/// text of a failed send so it is never silently discarded.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub content: Option<String>,
}

/// All client-side chat state for one logged-in user.
pub struct ChatState {
    pub(crate) local_user: Uuid,
    pub(crate) draft: String,
    pub(crate) staged_files: Vec<FileAttachment>,
    pub(crate) conversations: Vec<ConversationEntry>,
    pub(crate) selected: Option<ConvKey>,
    /// History of the selected conversation only.
    pub(crate) messages: Vec<LocalMessage>,
    pub(crate) names: HashMap<Uuid, String>,
    pub(crate) notices: Vec<Notice>,
    /// Monotonic tag for in-flight history fetches; bumped on every
    /// selection change so late responses can be recognized as stale.
    pub(crate) fetch_seq: u64,
}

impl ChatState {
    pub fn new(local_user: Uuid) -> Self {
        Self {
            local_user,
            draft: String::new(),
            staged_files: Vec::new(),
            conversations: Vec::new(),
            selected: None,
            messages: Vec::new(),
            names: HashMap::new(),
            notices: Vec::new(),
            fetch_seq: 0,
        }
    }

    pub fn local_user(&self) -> Uuid {
        self.local_user
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    pub fn stage_file(&mut self, file: FileAttachment) {
        self.staged_files.push(file);
    }

    pub fn staged_files(&self) -> &[FileAttachment] {
        &self.staged_files
    }

    pub fn conversations(&self) -> &[ConversationEntry] {
        &self.conversations
    }

    pub fn messages(&self) -> &[LocalMessage] {
        &self.messages
    }

    pub fn selected(&self) -> Option<ConvKey> {
        self.selected
    }

    /// Drain accumulated retryable notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn set_display_name(&mut self, user_id: Uuid, name: impl Into<String>) {
        self.names.insert(user_id, name.into());
    }

    /// Resolve a user id to a display name. Fallback policy: unknown users
    /// render as their id string, never as a placeholder that hides the id.
    pub fn display_name(&self, user_id: Uuid) -> String {
        match self.names.get(&user_id) {
            Some(name) => name.clone(),
            None => user_id.to_string(),
        }
    }

    /// Replace the conversation list from a server page, preserving any temp
    /// entries (they exist only locally).
    pub fn load_conversations(&mut self, conversations: &[Conversation]) {
        let temps: Vec<ConversationEntry> = self
            .conversations
            .iter()
            .filter(|e| e.key.is_temp())
            .cloned()
            .collect();
        self.conversations = conversations
            .iter()
            .map(ConversationEntry::from_server)
            .collect();
        self.conversations.extend(temps);
        self.sort_conversations();
    }

    /// Select a conversation. Clears the visible history and invalidates any
    /// in-flight history fetch for the previous selection.
    pub fn select_conversation(&mut self, key: ConvKey) {
        if self.selected == Some(key) {
            return;
        }
        self.selected = Some(key);
        self.messages.clear();
        self.fetch_seq += 1;
    }

    /// Open (or focus) a direct conversation with `other`. Reuses an
    /// existing entry for the pair when one is known; otherwise inserts a
    /// temp entry that a later [`promote_conversation`] call replaces.
    ///
    /// [`promote_conversation`]: ChatState::promote_conversation
    pub fn open_direct(&mut self, other: Uuid) -> ConvKey {
        let pair = canonical_pair(self.local_user, other);
        if let Some(entry) = self.conversations.iter().find(|e| e.participants == pair) {
            let key = entry.key;
            self.select_conversation(key);
            return key;
        }

        let entry = ConversationEntry {
            key: ConvKey::Temp(Uuid::new_v4()),
            participants: pair,
            message_count: 0,
            last_message: None,
            updated_at: Utc::now(),
        };
        let key = entry.key;
        self.conversations.insert(0, entry);
        self.select_conversation(key);
        key
    }

    /// Install the authoritative conversation for a participant pair,
    /// atomically replacing every temp entry for that pair. The list never
    /// shows a temp and a real entry for the same pair, and the replacement
    /// lands at the first temp's position so the list does not jump.
    pub fn promote_conversation(&mut self, conversation: &Conversation) {
        let pair = conversation.participants;
        let server_key = ConvKey::Server(conversation.id);

        let first_temp = self
            .conversations
            .iter()
            .position(|e| e.key.is_temp() && e.participants == pair);
        let selection_was_temp = self
            .selected
            .is_some_and(|key| key.is_temp() && self.entry(key).is_some_and(|e| e.participants == pair));

        self.conversations
            .retain(|e| !(e.key.is_temp() && e.participants == pair));

        if let Some(existing) = self.conversations.iter_mut().find(|e| e.key == server_key) {
            existing.message_count = conversation.message_count;
            existing.last_message = conversation.last_message.clone();
            existing.updated_at = conversation.updated_at;
        } else {
            let entry = ConversationEntry::from_server(conversation);
            let at = first_temp.unwrap_or(0).min(self.conversations.len());
            self.conversations.insert(at, entry);
        }

        if selection_was_temp {
            // Keep the user in the same (now authoritative) conversation
            // without clearing the optimistic history.
            self.selected = Some(server_key);
        }
    }

    /// Merge a server conversation into the list without touching temp
    /// entries for other pairs.
    pub fn upsert_conversation(&mut self, conversation: &Conversation) {
        match self
            .conversations
            .iter_mut()
            .find(|e| e.key == ConvKey::Server(conversation.id))
        {
            Some(entry) => {
                entry.message_count = conversation.message_count;
                entry.last_message = conversation.last_message.clone();
                entry.updated_at = conversation.updated_at;
            }
            None => {
                self.conversations
                    .insert(0, ConversationEntry::from_server(conversation));
            }
        }
        self.sort_conversations();
    }

    pub(crate) fn entry(&self, key: ConvKey) -> Option<&ConversationEntry> {
        self.conversations.iter().find(|e| e.key == key)
    }

    pub(crate) fn sort_conversations(&mut self) {
        // Most recently active first; stable so equal timestamps keep order.
        self.conversations
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }
}
