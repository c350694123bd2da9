use chrono::Duration;
use tracing::debug;

use courier_types::models::{LastMessage, Message, canonical_pair, preview_of};

use crate::state::{ChatState, ConvKey, Delivery, LocalMessage};

/// How far an optimistic PENDING bubble's local timestamp may drift from the
/// authoritative echo and still be treated as the same send. Temporary ids
/// are never known server-side, so the match is content + sender + window.
pub const OWN_ECHO_WINDOW_SECS: i64 = 10;

/// Window for dropping an inbound message redelivered through more than one
/// fan-out path when the id check alone does not catch it.
pub const INBOUND_DEDUP_WINDOW_SECS: i64 = 5;

impl ChatState {
    /// Merge an authoritative `new_message` event into local state.
    ///
    /// Own echoes replace their optimistic bubble in place; inbound
    /// messages are de-duplicated by id and then by a near-duplicate
    /// heuristic. Either way the conversation list's last-message preview is
    /// refreshed without changing which conversation is selected.
    pub fn apply_new_message(&mut self, message: &Message) {
        if self.selected == Some(ConvKey::Server(message.conversation_id)) {
            if message.sender_id == self.local_user {
                self.reconcile_own_echo(message);
            } else {
                self.reconcile_inbound(message);
            }
        }

        self.refresh_preview(message);
    }

    fn reconcile_own_echo(&mut self, message: &Message) {
        let window = Duration::seconds(OWN_ECHO_WINDOW_SECS);
        let matched = self.messages.iter().position(|m| {
            m.delivery == Delivery::Pending
                && m.sender_id == message.sender_id
                && m.content == message.content
                && (m.created_at - message.created_at).abs() < window
        });

        match matched {
            Some(index) => {
                // Replace in place so the bubble keeps its list position.
                // An upload/broadcast race can echo a record without its
                // attachment metadata; the optimistic copy wins then.
                let optimistic_files = std::mem::take(&mut self.messages[index].files);
                let mut confirmed = LocalMessage::from_server(message);
                if confirmed.files.is_empty() && !optimistic_files.is_empty() {
                    confirmed.files = optimistic_files;
                }
                confirmed.delivery = Delivery::Sent;
                self.messages[index] = confirmed;
                debug!("echo confirmed optimistic send {}", message.id);
            }
            None => {
                // No optimistic counterpart — an echo of a send from another
                // active session of the same user.
                if !self.contains_id(message) {
                    self.messages.push(LocalMessage::from_server(message));
                }
            }
        }
    }

    fn reconcile_inbound(&mut self, message: &Message) {
        if self.contains_id(message) {
            debug!("dropping exact duplicate {}", message.id);
            return;
        }

        let window = Duration::seconds(INBOUND_DEDUP_WINDOW_SECS);
        let near_duplicate = self.messages.iter().any(|m| {
            m.sender_id == message.sender_id
                && m.content == message.content
                && (m.created_at - message.created_at).abs() < window
        });
        if near_duplicate {
            debug!("dropping near-duplicate of {}", message.id);
            return;
        }

        self.messages.push(LocalMessage::from_server(message));
    }

    fn contains_id(&self, message: &Message) -> bool {
        self.messages.iter().any(|m| m.id == message.id)
    }

    /// Update the affected conversation's denormalized preview. The entry is
    /// created on the fly for a first-contact inbound message; selection is
    /// never changed here.
    fn refresh_preview(&mut self, message: &Message) {
        let key = ConvKey::Server(message.conversation_id);
        let preview = LastMessage {
            message_id: message.id,
            content: preview_of(&message.content),
            sender_id: message.sender_id,
            sent_at: message.created_at,
        };

        match self.conversations.iter_mut().find(|e| e.key == key) {
            Some(entry) => {
                // Idempotent under redelivery: the counter only moves for a
                // message newer than the current preview.
                if entry.last_message.as_ref().map(|l| l.message_id) != Some(message.id) {
                    entry.message_count += 1;
                }
                entry.last_message = Some(preview);
                entry.updated_at = message.created_at;
            }
            None if message.sender_id != self.local_user => {
                self.conversations.insert(
                    0,
                    crate::state::ConversationEntry {
                        key,
                        participants: canonical_pair(self.local_user, message.sender_id),
                        message_count: 1,
                        last_message: Some(preview),
                        updated_at: message.created_at,
                    },
                );
            }
            // An own-send echo for an unknown conversation (second session):
            // the other participant cannot be derived from the message, so
            // the entry appears on the next conversation-list refresh.
            None => {}
        }

        self.sort_conversations();
    }
}
