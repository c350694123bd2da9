use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use crate::models::{UploadRow, now_string};
use crate::{Database, Result};

impl Database {
    /// Record an uploaded blob's metadata. The bytes themselves live on disk
    /// under the configured upload directory.
    pub fn insert_upload(
        &self,
        id: Uuid,
        owner_id: Uuid,
        file_name: &str,
        file_size: u64,
        mime_type: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO uploads (id, owner_id, file_name, file_size, mime_type, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    owner_id.to_string(),
                    file_name,
                    file_size as i64,
                    mime_type,
                    now_string(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_upload(&self, id: Uuid) -> Result<Option<UploadRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, owner_id, file_name, file_size, mime_type, created_at \
                     FROM uploads WHERE id = ?1",
                    [id.to_string()],
                    |row| {
                        Ok(UploadRow {
                            id: row.get(0)?,
                            owner_id: row.get(1)?,
                            file_name: row.get(2)?,
                            file_size: row.get(3)?,
                            mime_type: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }
}
