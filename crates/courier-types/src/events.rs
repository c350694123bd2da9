use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{FileAttachment, Message, MessageType};

/// Commands sent FROM client TO server over the WebSocket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Subscribe this connection to a conversation's broadcast group.
    /// Participant membership is re-checked on every join.
    JoinConversation { conversation_id: Uuid },

    /// Unsubscribe from a conversation's broadcast group. No-op if the
    /// connection was not subscribed.
    LeaveConversation { conversation_id: Uuid },

    /// Persist a message and fan it out to the conversation's group.
    SendMessage {
        conversation_id: Uuid,
        content: String,
        #[serde(default)]
        message_type: MessageType,
        #[serde(default)]
        files: Vec<FileAttachment>,
    },
}

/// Events sent FROM server TO client over the WebSocket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// An authoritative message record, delivered to every connection
    /// subscribed to the conversation's group — including the sender's own.
    NewMessage { message: Message },

    /// A handler failed. The connection stays open; only authentication
    /// failure closes it.
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_snake_case_wire_names() {
        let cmd = GatewayCommand::JoinConversation {
            conversation_id: Uuid::new_v4(),
        };
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["type"], "join_conversation");
        assert!(v["data"].get("conversation_id").is_some());
    }

    #[test]
    fn send_message_defaults_type_and_files() {
        let raw = format!(
            r#"{{"type":"send_message","data":{{"conversation_id":"{}","content":"hi"}}}}"#,
            Uuid::new_v4()
        );
        let cmd: GatewayCommand = serde_json::from_str(&raw).unwrap();
        match cmd {
            GatewayCommand::SendMessage {
                message_type,
                files,
                ..
            } => {
                assert_eq!(message_type, MessageType::Text);
                assert!(files.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn new_message_event_tag() {
        let now = chrono::Utc::now();
        let event = GatewayEvent::NewMessage {
            message: Message {
                id: Uuid::new_v4(),
                conversation_id: Uuid::new_v4(),
                sender_id: Uuid::new_v4(),
                content: "hello".into(),
                message_type: MessageType::Text,
                status: crate::models::MessageStatus::Sent,
                files: vec![],
                read_by: vec![],
                created_at: now,
                updated_at: now,
            },
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "new_message");
    }
}
