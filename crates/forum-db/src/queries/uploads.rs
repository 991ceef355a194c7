use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use crate::models::UploadRow;
use crate::{Database, now};

impl Database {
    // -- Uploads --

    pub fn insert_upload(&self, id: &str, owner_id: &str, content_type: &str, size: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO uploads (id, owner_id, content_type, size, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, owner_id, content_type, size, now()],
            )?;
            Ok(())
        })
    }

    pub fn get_upload(&self, id: &str) -> Result<Option<UploadRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, owner_id, content_type, size, created_at FROM uploads WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(UploadRow {
                            id: row.get(0)?,
                            owner_id: row.get(1)?,
                            content_type: row.get(2)?,
                            size: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )
                .optional()?)
        })
    }
}
