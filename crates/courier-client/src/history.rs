use uuid::Uuid;

use courier_types::models::Message;

use crate::state::{ChatState, LocalMessage};

/// Tag handed out when a history fetch starts. The response is applied only
/// if the same conversation is still selected and no newer fetch began.
#[derive(Debug, Clone, Copy)]
pub struct FetchTicket {
    pub conversation_id: Uuid,
    pub(crate) seq: u64,
}

impl ChatState {
    /// Start a message-history fetch for the selected conversation. Temp
    /// conversations have no server-side history, so they yield `None`.
    pub fn begin_history_fetch(&mut self) -> Option<FetchTicket> {
        let conversation_id = self.selected?.server_id()?;
        self.fetch_seq += 1;
        Some(FetchTicket {
            conversation_id,
            seq: self.fetch_seq,
        })
    }

    /// Apply a resolved history fetch. A late response for a conversation
    /// that is no longer selected (or that was re-fetched since) is
    /// discarded; returns whether the page was applied.
    pub fn apply_history(&mut self, ticket: FetchTicket, page: &[Message]) -> bool {
        if ticket.seq != self.fetch_seq {
            return false;
        }
        if self.selected.and_then(|key| key.server_id()) != Some(ticket.conversation_id) {
            return false;
        }

        self.messages = page.iter().map(LocalMessage::from_server).collect();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_types::models::{MessageStatus, MessageType};

    use crate::state::ConvKey;

    fn server_message(conversation_id: Uuid, sender: Uuid, content: &str) -> Message {
        let now = Utc::now();
        Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: sender,
            content: content.into(),
            message_type: MessageType::Text,
            status: MessageStatus::Sent,
            files: vec![],
            read_by: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn history_applies_for_the_still_selected_conversation() {
        let me = Uuid::new_v4();
        let conv = Uuid::new_v4();
        let mut state = ChatState::new(me);
        state.select_conversation(ConvKey::Server(conv));

        let ticket = state.begin_history_fetch().unwrap();
        let page = vec![server_message(conv, me, "old")];
        assert!(state.apply_history(ticket, &page));
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn late_response_for_a_deselected_conversation_is_discarded() {
        let me = Uuid::new_v4();
        let (conv_a, conv_b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut state = ChatState::new(me);

        state.select_conversation(ConvKey::Server(conv_a));
        let ticket = state.begin_history_fetch().unwrap();

        // The user switches away while the fetch is in flight.
        state.select_conversation(ConvKey::Server(conv_b));

        let page = vec![server_message(conv_a, me, "stale")];
        assert!(!state.apply_history(ticket, &page));
        assert!(state.messages().is_empty());
    }

    #[test]
    fn superseded_fetch_is_discarded() {
        let me = Uuid::new_v4();
        let conv = Uuid::new_v4();
        let mut state = ChatState::new(me);
        state.select_conversation(ConvKey::Server(conv));

        let stale = state.begin_history_fetch().unwrap();
        let fresh = state.begin_history_fetch().unwrap();

        assert!(!state.apply_history(stale, &[server_message(conv, me, "a")]));
        assert!(state.apply_history(fresh, &[server_message(conv, me, "b")]));
        assert_eq!(state.messages()[0].content, "b");
    }

    #[test]
    fn temp_conversations_have_no_history_fetch() {
        let me = Uuid::new_v4();
        let mut state = ChatState::new(me);
        state.open_direct(Uuid::new_v4());
        assert!(state.begin_history_fetch().is_none());
    }
}
