use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use courier_types::api::PageQuery;
use courier_types::models::{
    FileAttachment, LastMessage, MAX_CONTENT_CHARS, Message, MessageType, ReadReceipt, preview_of,
};

use crate::conversations::{is_participant, update_last_message};
use crate::models::{
    MessageRow, message_type_str, now_string, parse_message_type, parse_status, parse_time,
    parse_uuid, time_string,
};
use crate::{Database, Result, StoreError};

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, message_type, status, created_at, updated_at";

impl Database {
    /// Persist a new message with status SENT and refresh the conversation's
    /// last-message snapshot. The returned record is the authoritative object
    /// callers broadcast.
    ///
    /// The message insert and the snapshot update are two statements, not one
    /// transaction: a crash between them leaves the preview stale while the
    /// message stays durable.
    pub fn send_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        message_type: MessageType,
        files: &[FileAttachment],
    ) -> Result<Message> {
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(StoreError::Validation(format!(
                "content exceeds {MAX_CONTENT_CHARS} characters"
            )));
        }
        if content.is_empty() && files.is_empty() {
            return Err(StoreError::Validation(
                "a message needs content or at least one file".into(),
            ));
        }

        self.with_conn(|conn| {
            if !is_participant(conn, conversation_id, sender_id)? {
                return Err(StoreError::PermissionDenied);
            }

            let id = Uuid::new_v4();
            let now = chrono::Utc::now();
            let now_s = time_string(now);

            conn.execute(
                "INSERT INTO messages \
                 (id, conversation_id, sender_id, content, message_type, status, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 'SENT', ?6, ?6)",
                params![
                    id.to_string(),
                    conversation_id.to_string(),
                    sender_id.to_string(),
                    content,
                    message_type_str(message_type),
                    now_s,
                ],
            )?;

            for (position, file) in files.iter().enumerate() {
                conn.execute(
                    "INSERT INTO message_files \
                     (message_id, position, file_url, file_name, file_size, mime_type) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id.to_string(),
                        position as i64,
                        file.file_url,
                        file.file_name,
                        file.file_size as i64,
                        file.mime_type,
                    ],
                )?;
            }

            update_last_message(
                conn,
                conversation_id,
                &LastMessage {
                    message_id: id,
                    content: preview_of(content),
                    sender_id,
                    sent_at: now,
                },
            )?;

            let row = query_message(conn, id)?.ok_or(StoreError::NotFound)?;
            let mut hydrated = hydrate(conn, vec![row])?;
            Ok(hydrated.remove(0))
        })
    }

    /// A page of a conversation's messages in creation order, plus the total
    /// count for pagination metadata. PermissionDenied for non-participants,
    /// unknown conversations included.
    pub fn list_messages(
        &self,
        conversation_id: Uuid,
        caller_id: Uuid,
        page: &PageQuery,
    ) -> Result<(Vec<Message>, u64)> {
        self.with_conn(|conn| {
            if !is_participant(conn, conversation_id, caller_id)? {
                return Err(StoreError::PermissionDenied);
            }

            let cid = conversation_id.to_string();
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                [&cid],
                |row| row.get(0),
            )?;

            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1 \
                 ORDER BY created_at ASC, rowid ASC LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![cid, page.limit(), page.offset()], row_mapper)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((hydrate(conn, rows)?, total.max(0) as u64))
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        self.with_conn(|conn| match query_message(conn, id)? {
            Some(row) => Ok(Some(hydrate(conn, vec![row])?.remove(0))),
            None => Ok(None),
        })
    }

    /// Mark every message in the conversation that the caller did not send
    /// and has not yet read. Appends a read receipt and flips status to READ.
    /// Idempotent: a second invocation is a no-op. Returns the number of
    /// newly marked messages.
    pub fn mark_conversation_read(&self, conversation_id: Uuid, caller_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            if !is_participant(conn, conversation_id, caller_id)? {
                return Err(StoreError::PermissionDenied);
            }

            let cid = conversation_id.to_string();
            let uid = caller_id.to_string();
            let now = now_string();

            let marked = conn.execute(
                "INSERT INTO message_reads (message_id, user_id, read_at) \
                 SELECT id, ?2, ?3 FROM messages \
                 WHERE conversation_id = ?1 AND sender_id != ?2 \
                   AND id NOT IN (SELECT message_id FROM message_reads WHERE user_id = ?2)",
                params![cid, uid, now],
            )?;

            conn.execute(
                "UPDATE messages SET status = 'READ', updated_at = ?3 \
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND status != 'READ'",
                params![cid, uid, now],
            )?;

            Ok(marked as u64)
        })
    }
}

fn query_message(conn: &Connection, id: Uuid) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id.to_string()], row_mapper)
        .optional()?;
    Ok(row)
}

fn row_mapper(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        message_type: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Batch-fetch files and read receipts for a page of messages, then convert
/// rows into wire models.
fn hydrate(conn: &Connection, rows: Vec<MessageRow>) -> Result<Vec<Message>> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let id_params: Vec<&dyn rusqlite::types::ToSql> = ids
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let mut files_by_message: HashMap<String, Vec<FileAttachment>> = HashMap::new();
    {
        let sql = format!(
            "SELECT message_id, file_url, file_name, file_size, mime_type \
             FROM message_files WHERE message_id IN ({}) \
             ORDER BY message_id, position",
            placeholders.join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let file_rows = stmt
            .query_map(id_params.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    FileAttachment {
                        file_url: row.get(1)?,
                        file_name: row.get(2)?,
                        file_size: row.get::<_, i64>(3)?.max(0) as u64,
                        mime_type: row.get(4)?,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (message_id, file) in file_rows {
            files_by_message.entry(message_id).or_default().push(file);
        }
    }

    let mut reads_by_message: HashMap<String, Vec<ReadReceipt>> = HashMap::new();
    {
        let sql = format!(
            "SELECT message_id, user_id, read_at FROM message_reads \
             WHERE message_id IN ({}) ORDER BY message_id, read_at",
            placeholders.join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let read_rows = stmt
            .query_map(id_params.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (message_id, user_id, read_at) in read_rows {
            reads_by_message
                .entry(message_id)
                .or_default()
                .push(ReadReceipt {
                    user_id: parse_uuid(&user_id)?,
                    read_at: parse_time(&read_at)?,
                });
        }
    }

    rows.into_iter()
        .map(|row| {
            Ok(Message {
                id: parse_uuid(&row.id)?,
                conversation_id: parse_uuid(&row.conversation_id)?,
                sender_id: parse_uuid(&row.sender_id)?,
                content: row.content,
                message_type: parse_message_type(&row.message_type)?,
                status: parse_status(&row.status)?,
                files: files_by_message.remove(&row.id).unwrap_or_default(),
                read_by: reads_by_message.remove(&row.id).unwrap_or_default(),
                created_at: parse_time(&row.created_at)?,
                updated_at: parse_time(&row.updated_at)?,
            })
        })
        .collect()
}
