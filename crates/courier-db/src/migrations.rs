use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id                      TEXT PRIMARY KEY,
            participant_low         TEXT NOT NULL,
            participant_high        TEXT NOT NULL,
            kind                    TEXT NOT NULL DEFAULT 'DIRECT',
            message_count           INTEGER NOT NULL DEFAULT 0,
            last_message_id         TEXT,
            last_message_content    TEXT,
            last_message_sender_id  TEXT,
            last_message_sent_at    TEXT,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL,
            UNIQUE(participant_low, participant_high, kind)
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_updated
            ON conversations(updated_at);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            sender_id       TEXT NOT NULL,
            content         TEXT NOT NULL,
            message_type    TEXT NOT NULL DEFAULT 'TEXT',
            status          TEXT NOT NULL DEFAULT 'SENT',
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS message_files (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            position    INTEGER NOT NULL,
            file_url    TEXT NOT NULL,
            file_name   TEXT NOT NULL,
            file_size   INTEGER NOT NULL,
            mime_type   TEXT NOT NULL,
            PRIMARY KEY (message_id, position)
        );

        CREATE TABLE IF NOT EXISTS message_reads (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL,
            read_at     TEXT NOT NULL,
            UNIQUE(message_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_message_reads_message
            ON message_reads(message_id);

        CREATE TABLE IF NOT EXISTS uploads (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL,
            file_name   TEXT NOT NULL,
            file_size   INTEGER NOT NULL,
            mime_type   TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
