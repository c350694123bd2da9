use chrono::{Duration, Utc};
use uuid::Uuid;

use courier_client::{ChatState, ConvKey, Delivery};
use courier_types::models::{
    Conversation, ConversationKind, FileAttachment, Message, MessageStatus, MessageType,
    canonical_pair,
};

fn server_conversation(a: Uuid, b: Uuid) -> Conversation {
    let now = Utc::now();
    Conversation {
        id: Uuid::new_v4(),
        participants: canonical_pair(a, b),
        kind: ConversationKind::Direct,
        message_count: 0,
        last_message: None,
        created_at: now,
        updated_at: now,
    }
}

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

fn attachment(name: &str) -> FileAttachment {
    FileAttachment {
        file_url: format!("/files/{name}"),
        file_name: name.into(),
        file_size: 42,
        mime_type: "image/png".into(),
    }
}

/// Set up a state with an authoritative conversation selected.
fn selected_state(me: Uuid, other: Uuid) -> (ChatState, Conversation) {
    let mut state = ChatState::new(me);
    let conv = server_conversation(me, other);
    state.open_direct(other);
    state.promote_conversation(&conv);
    (state, conv)
}

#[test]
fn own_echo_replaces_the_pending_bubble_in_place() {
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut state, conv) = selected_state(me, other);

    // An older confirmed message sits above the optimistic one.
    state.apply_new_message(&server_message(conv.id, other, "earlier"));

    state.set_draft("hi");
    let out = state.begin_send().unwrap();

    let echo = server_message(conv.id, me, "hi");
    state.apply_new_message(&echo);

    let messages = state.messages();
    assert_eq!(messages.len(), 2, "list length must not change on echo");
    assert_eq!(messages[1].id, echo.id);
    assert_eq!(messages[1].delivery, Delivery::Sent);
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.content == "hi")
            .count(),
        1,
        "exactly one bubble for the send"
    );
    assert_ne!(messages[1].id, out.local_id);
}

#[test]
fn own_echo_outside_the_window_appends_instead() {
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut state, conv) = selected_state(me, other);

    state.set_draft("hi");
    state.begin_send().unwrap();

    let mut echo = server_message(conv.id, me, "hi");
    echo.created_at = Utc::now() - Duration::seconds(30);
    state.apply_new_message(&echo);

    // Too old to be our optimistic send; both records stay.
    assert_eq!(state.messages().len(), 2);
    assert_eq!(state.messages()[0].delivery, Delivery::Pending);
}

#[test]
fn own_echo_from_a_second_session_is_appended() {
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut state, conv) = selected_state(me, other);

    // No optimistic counterpart exists locally.
    let echo = server_message(conv.id, me, "sent elsewhere");
    state.apply_new_message(&echo);

    assert_eq!(state.messages().len(), 1);
    assert_eq!(state.messages()[0].id, echo.id);
    assert_eq!(state.messages()[0].delivery, Delivery::Sent);
}

#[test]
fn echo_keeps_optimistic_attachments_when_the_record_has_none() {
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut state, conv) = selected_state(me, other);

    state.stage_file(attachment("photo.png"));
    state.set_draft("look");
    state.begin_send().unwrap();

    // Upload/broadcast race: the echo arrives without file metadata.
    let echo = server_message(conv.id, me, "look");
    state.apply_new_message(&echo);

    assert_eq!(state.messages().len(), 1);
    assert_eq!(state.messages()[0].files, vec![attachment("photo.png")]);
}

#[test]
fn echo_attachments_win_when_present() {
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut state, conv) = selected_state(me, other);

    state.stage_file(attachment("local.png"));
    state.set_draft("look");
    state.begin_send().unwrap();

    let mut echo = server_message(conv.id, me, "look");
    echo.files = vec![attachment("authoritative.png")];
    state.apply_new_message(&echo);

    assert_eq!(state.messages()[0].files, vec![attachment("authoritative.png")]);
}

#[test]
fn inbound_duplicate_by_id_is_dropped() {
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut state, conv) = selected_state(me, other);

    let msg = server_message(conv.id, other, "hello");
    state.apply_new_message(&msg);
    state.apply_new_message(&msg);

    assert_eq!(state.messages().len(), 1);
}

#[test]
fn inbound_near_duplicate_within_window_is_dropped() {
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut state, conv) = selected_state(me, other);

    let first = server_message(conv.id, other, "hello");
    state.apply_new_message(&first);

    // Redelivery through a second fan-out path gets a fresh id but nearly
    // the same timestamp.
    let mut redelivered = server_message(conv.id, other, "hello");
    redelivered.created_at = first.created_at + Duration::seconds(2);
    state.apply_new_message(&redelivered);

    assert_eq!(state.messages().len(), 1);
}

#[test]
fn repeated_text_outside_the_window_is_kept() {
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut state, conv) = selected_state(me, other);

    let first = server_message(conv.id, other, "ok");
    state.apply_new_message(&first);

    let mut later = server_message(conv.id, other, "ok");
    later.created_at = first.created_at + Duration::seconds(8);
    state.apply_new_message(&later);

    assert_eq!(state.messages().len(), 2);
}

#[test]
fn events_for_unselected_conversations_update_only_the_list() {
    let me = Uuid::new_v4();
    let (other_a, other_b) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut state, conv_a) = selected_state(me, other_a);

    let conv_b = server_conversation(me, other_b);
    state.upsert_conversation(&conv_b);
    state.select_conversation(ConvKey::Server(conv_a.id));

    let msg = server_message(conv_b.id, other_b, "psst");
    state.apply_new_message(&msg);

    // Still viewing conversation A; B's preview refreshed in the background.
    assert_eq!(state.selected(), Some(ConvKey::Server(conv_a.id)));
    assert!(state.messages().is_empty());
    let entry = state
        .conversations()
        .iter()
        .find(|e| e.key == ConvKey::Server(conv_b.id))
        .unwrap();
    assert_eq!(entry.last_message.as_ref().unwrap().content, "psst");
    assert_eq!(entry.message_count, 1);
}

#[test]
fn first_contact_inbound_creates_a_list_entry() {
    let me = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let mut state = ChatState::new(me);

    let conv_id = Uuid::new_v4();
    state.apply_new_message(&server_message(conv_id, stranger, "hi!"));

    assert_eq!(state.conversations().len(), 1);
    let entry = &state.conversations()[0];
    assert_eq!(entry.key, ConvKey::Server(conv_id));
    assert_eq!(entry.participants, canonical_pair(me, stranger));
}

#[test]
fn promotion_replaces_every_temp_entry_for_the_pair() {
    let me = Uuid::new_v4();
    let other = Uuid::new_v4();
    let mut state = ChatState::new(me);

    let temp = state.open_direct(other);
    assert!(temp.is_temp());

    let conv = server_conversation(me, other);
    state.promote_conversation(&conv);

    // The visible list never shows both a temp and a real entry.
    assert_eq!(state.conversations().len(), 1);
    assert_eq!(state.conversations()[0].key, ConvKey::Server(conv.id));
    assert_eq!(state.selected(), Some(ConvKey::Server(conv.id)));
}

#[test]
fn promotion_keeps_the_list_position() {
    let me = Uuid::new_v4();
    let mut state = ChatState::new(me);

    // An unrelated server conversation already sits in the list.
    let existing = server_conversation(me, Uuid::new_v4());
    state.upsert_conversation(&existing);

    let other = Uuid::new_v4();
    state.open_direct(other); // temp lands at the front

    let conv = server_conversation(me, other);
    state.promote_conversation(&conv);

    assert_eq!(state.conversations().len(), 2);
    assert_eq!(state.conversations()[0].key, ConvKey::Server(conv.id));
}

#[test]
fn promotion_deduplicates_against_an_existing_real_entry() {
    let me = Uuid::new_v4();
    let other = Uuid::new_v4();
    let mut state = ChatState::new(me);

    let conv = server_conversation(me, other);
    state.upsert_conversation(&conv);
    state.open_direct(other); // pair already known: no temp is created

    state.promote_conversation(&conv);
    assert_eq!(state.conversations().len(), 1);
}

#[test]
fn optimistic_history_survives_promotion() {
    let me = Uuid::new_v4();
    let other = Uuid::new_v4();
    let mut state = ChatState::new(me);

    state.open_direct(other);
    state.set_draft("first contact");
    let out = state.begin_send().unwrap();
    assert!(out.conversation.is_temp());

    let conv = server_conversation(me, other);
    state.promote_conversation(&conv);

    // The pending bubble is still on screen, now under the real id.
    assert_eq!(state.messages().len(), 1);
    assert_eq!(state.messages()[0].delivery, Delivery::Pending);

    // And the echo resolves it as usual after the real send goes out.
    let echo = server_message(conv.id, me, "first contact");
    state.apply_new_message(&echo);
    assert_eq!(state.messages().len(), 1);
    assert_eq!(state.messages()[0].delivery, Delivery::Sent);
}
