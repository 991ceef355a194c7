use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::ReportRow;
use crate::queries::author_at;
use crate::{Database, now};

fn query_report(conn: &Connection, id: &str) -> Result<Option<ReportRow>> {
    Ok(conn
        .query_row(
            "SELECT rp.id, rp.post_id, rp.reply_id, rp.reporter_id, rp.reason, rp.description,
                    rp.status, rp.reviewed_by, rp.reviewed_at, rp.created_at,
                    u.id, u.username, u.avatar_url
             FROM reports rp LEFT JOIN users u ON u.id = rp.reporter_id
             WHERE rp.id = ?1",
            [id],
            |row| {
                Ok(ReportRow {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    reply_id: row.get(2)?,
                    reporter_id: row.get(3)?,
                    reason: row.get(4)?,
                    description: row.get(5)?,
                    status: row.get(6)?,
                    reviewed_by: row.get(7)?,
                    reviewed_at: row.get(8)?,
                    created_at: row.get(9)?,
                    reporter: author_at(row, 10)?,
                })
            },
        )
        .optional()?)
}

impl Database {
    // -- Content reports --

    /// Files a report against a post, or against one of its replies when
    /// `reply_id` is set. Returns `None` if this reporter already reported
    /// the same target.
    pub fn create_report(
        &self,
        id: &str,
        post_id: &str,
        reply_id: Option<&str>,
        reporter_id: &str,
        reason: &str,
        description: Option<&str>,
    ) -> Result<Option<ReportRow>> {
        self.with_conn(|conn| {
            let duplicate: bool = match reply_id {
                Some(reply_id) => conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM reports WHERE reply_id = ?1 AND reporter_id = ?2)",
                    params![reply_id, reporter_id],
                    |r| r.get(0),
                )?,
                None => conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM reports
                     WHERE post_id = ?1 AND reply_id IS NULL AND reporter_id = ?2)",
                    params![post_id, reporter_id],
                    |r| r.get(0),
                )?,
            };
            if duplicate {
                return Ok(None);
            }

            conn.execute(
                "INSERT INTO reports (id, post_id, reply_id, reporter_id, reason, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, post_id, reply_id, reporter_id, reason, description, now()],
            )?;
            query_report(conn, id)
        })
    }
}
