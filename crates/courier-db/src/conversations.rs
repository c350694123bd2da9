use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use courier_types::api::PageQuery;
use courier_types::models::{Conversation, LastMessage, canonical_pair};

use crate::models::{ConversationRow, now_string, time_string};
use crate::{Database, Result, StoreError};

const CONVERSATION_COLUMNS: &str = "id, participant_low, participant_high, message_count, \
     last_message_id, last_message_content, last_message_sender_id, last_message_sent_at, \
     created_at, updated_at";

impl Database {
    /// Find the DIRECT conversation for an unordered participant pair,
    /// creating it if absent. Concurrent first-contact from both sides is
    /// resolved by the UNIQUE constraint over the canonical pair: the losing
    /// insert is ignored and the re-read returns the winner's row.
    pub fn find_or_create_direct(&self, a: Uuid, b: Uuid) -> Result<(Conversation, bool)> {
        if a == b {
            return Err(StoreError::Validation(
                "a conversation needs two distinct participants".into(),
            ));
        }
        let [low, high] = canonical_pair(a, b);

        self.with_conn(|conn| {
            let now = now_string();
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO conversations \
                 (id, participant_low, participant_high, kind, message_count, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, 'DIRECT', 0, ?4, ?4)",
                params![
                    Uuid::new_v4().to_string(),
                    low.to_string(),
                    high.to_string(),
                    now
                ],
            )?;

            let row = query_direct_by_pair(conn, low, high)?.ok_or(StoreError::NotFound)?;
            Ok((row.into_conversation()?, inserted == 1))
        })
    }

    /// The sole authorization primitive used by every message operation.
    /// Unknown conversation ids yield `false`, not an error — callers decide
    /// how to surface that.
    pub fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| is_participant(conn, conversation_id, user_id))
    }

    pub fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.with_conn(|conn| {
            query_conversation(conn, id)?
                .map(ConversationRow::into_conversation)
                .transpose()
        })
    }

    /// Conversations the user participates in, most recently active first.
    pub fn list_conversations(
        &self,
        user_id: Uuid,
        page: &PageQuery,
    ) -> Result<(Vec<Conversation>, u64)> {
        let uid = user_id.to_string();
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM conversations \
                 WHERE participant_low = ?1 OR participant_high = ?1",
                [&uid],
                |row| row.get(0),
            )?;

            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                 WHERE participant_low = ?1 OR participant_high = ?1 \
                 ORDER BY updated_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![uid, page.limit(), page.offset()], row_mapper)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let conversations = rows
                .into_iter()
                .map(ConversationRow::into_conversation)
                .collect::<Result<Vec<_>>>()?;

            Ok((conversations, total.max(0) as u64))
        })
    }

    /// Set the denormalized last-message snapshot and bump the message
    /// counter. Runs as its own statement, separate from the message insert;
    /// the inconsistency window between the two is accepted.
    pub fn update_last_message(&self, conversation_id: Uuid, preview: &LastMessage) -> Result<()> {
        self.with_conn(|conn| update_last_message(conn, conversation_id, preview))
    }
}

pub(crate) fn is_participant(conn: &Connection, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
    let uid = user_id.to_string();
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM conversations \
             WHERE id = ?1 AND (participant_low = ?2 OR participant_high = ?2)",
            params![conversation_id.to_string(), uid],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn update_last_message(
    conn: &Connection,
    conversation_id: Uuid,
    preview: &LastMessage,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE conversations SET \
         last_message_id = ?2, last_message_content = ?3, \
         last_message_sender_id = ?4, last_message_sent_at = ?5, \
         message_count = message_count + 1, updated_at = ?6 \
         WHERE id = ?1",
        params![
            conversation_id.to_string(),
            preview.message_id.to_string(),
            preview.content,
            preview.sender_id.to_string(),
            time_string(preview.sent_at),
            now_string(),
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub(crate) fn query_conversation(conn: &Connection, id: Uuid) -> Result<Option<ConversationRow>> {
    let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id.to_string()], row_mapper)
        .optional()?;
    Ok(row)
}

fn query_direct_by_pair(conn: &Connection, low: Uuid, high: Uuid) -> Result<Option<ConversationRow>> {
    let sql = format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations \
         WHERE participant_low = ?1 AND participant_high = ?2 AND kind = 'DIRECT'"
    );
    let row = conn
        .query_row(&sql, params![low.to_string(), high.to_string()], row_mapper)
        .optional()?;
    Ok(row)
}

fn row_mapper(row: &rusqlite::Row<'_>) -> std::result::Result<ConversationRow, rusqlite::Error> {
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_low: row.get(1)?,
        participant_high: row.get(2)?,
        message_count: row.get(3)?,
        last_message_id: row.get(4)?,
        last_message_content: row.get(5)?,
        last_message_sender_id: row.get(6)?,
        last_message_sent_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
