use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use courier_types::models::{FileAttachment, MessageType};

use crate::state::{ChatState, ConvKey, Delivery, LocalMessage, Notice};

/// The payload the transport should put on the wire for an optimistic send.
#[derive(Debug, Clone)]
pub struct OutgoingSend {
    /// Client-generated temporary id of the optimistic bubble.
    pub local_id: Uuid,
    /// May still be a temp key; the caller must promote the conversation
    /// (find-or-create) before the first real send.
    pub conversation: ConvKey,
    pub content: String,
    pub message_type: MessageType,
    pub files: Vec<FileAttachment>,
}

impl ChatState {
    /// Start a user-initiated send: insert a PENDING bubble with the typed
    /// content and any staged attachment metadata, clear the compose input,
    /// and hand the payload to the transport.
    ///
    /// Returns `None` when nothing is selected or there is nothing to send.
    pub fn begin_send(&mut self) -> Option<OutgoingSend> {
        let conversation = self.selected?;
        if self.draft.is_empty() && self.staged_files.is_empty() {
            return None;
        }

        let content = std::mem::take(&mut self.draft);
        let files = std::mem::take(&mut self.staged_files);
        let message_type = infer_message_type(&files);
        let local_id = Uuid::new_v4();

        self.messages.push(LocalMessage {
            id: local_id,
            sender_id: self.local_user,
            content: content.clone(),
            message_type,
            files: files.clone(),
            created_at: Utc::now(),
            delivery: Delivery::Pending,
        });
        debug!("optimistic send {} queued", local_id);

        Some(OutgoingSend {
            local_id,
            conversation,
            content,
            message_type,
            files,
        })
    }

    /// A send failed after the optimistic insert. The bubble is removed, the
    /// typed content goes back into the draft (or onto the notice when the
    /// user has started typing again), and a retryable notice is recorded.
    pub fn on_send_failed(&mut self, local_id: Uuid, reason: &str) {
        let Some(index) = self
            .messages
            .iter()
            .position(|m| m.delivery == Delivery::Pending && m.id == local_id)
        else {
            return;
        };
        let failed = self.messages.remove(index);

        let content = if self.draft.is_empty() && !failed.content.is_empty() {
            self.draft = failed.content;
            None
        } else {
            Some(failed.content).filter(|c| !c.is_empty())
        };

        self.notices.push(Notice {
            message: format!("Message not sent: {reason}. Tap to retry."),
            content,
        });
    }

    /// An attachment upload failed before the send was issued. Staged files
    /// are dropped; the draft is untouched.
    pub fn on_upload_failed(&mut self, reason: &str) {
        self.staged_files.clear();
        self.notices.push(Notice {
            message: format!("Upload failed: {reason}. Tap to retry."),
            content: None,
        });
    }
}

/// Attachment-driven message typing: probing optional fields is replaced by
/// one explicit mapping from the first attachment's mime class.
fn infer_message_type(files: &[FileAttachment]) -> MessageType {
    let Some(first) = files.first() else {
        return MessageType::Text;
    };
    if first.mime_type.starts_with("image/") {
        MessageType::Image
    } else if first.mime_type.starts_with("video/") {
        MessageType::Video
    } else {
        MessageType::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(mime: &str) -> FileAttachment {
        FileAttachment {
            file_url: "/files/x".into(),
            file_name: "x".into(),
            file_size: 1,
            mime_type: mime.into(),
        }
    }

    #[test]
    fn begin_send_inserts_pending_and_clears_draft() {
        let me = Uuid::new_v4();
        let mut state = ChatState::new(me);
        state.open_direct(Uuid::new_v4());
        state.set_draft("hi there");

        let out = state.begin_send().unwrap();
        assert_eq!(out.content, "hi there");
        assert_eq!(out.message_type, MessageType::Text);
        assert!(state.draft().is_empty());
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].delivery, Delivery::Pending);
        assert_eq!(state.messages()[0].id, out.local_id);
    }

    #[test]
    fn begin_send_with_nothing_to_send_is_none() {
        let mut state = ChatState::new(Uuid::new_v4());
        state.open_direct(Uuid::new_v4());
        assert!(state.begin_send().is_none());
    }

    #[test]
    fn message_type_follows_first_attachment() {
        assert_eq!(infer_message_type(&[]), MessageType::Text);
        assert_eq!(
            infer_message_type(&[attachment("image/png")]),
            MessageType::Image
        );
        assert_eq!(
            infer_message_type(&[attachment("video/mp4")]),
            MessageType::Video
        );
        assert_eq!(
            infer_message_type(&[attachment("application/pdf")]),
            MessageType::File
        );
    }

    #[test]
    fn send_failure_restores_the_draft() {
        let mut state = ChatState::new(Uuid::new_v4());
        state.open_direct(Uuid::new_v4());
        state.set_draft("important words");
        let out = state.begin_send().unwrap();

        state.on_send_failed(out.local_id, "network");
        assert!(state.messages().is_empty());
        assert_eq!(state.draft(), "important words");
        let notices = state.take_notices();
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn send_failure_never_discards_text_when_user_kept_typing() {
        let mut state = ChatState::new(Uuid::new_v4());
        state.open_direct(Uuid::new_v4());
        state.set_draft("first");
        let out = state.begin_send().unwrap();
        state.set_draft("second draft in progress");

        state.on_send_failed(out.local_id, "timeout");
        assert_eq!(state.draft(), "second draft in progress");
        let notices = state.take_notices();
        assert_eq!(notices[0].content.as_deref(), Some("first"));
    }
}
