use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::{AnnouncementChanges, AnnouncementRow, AuthorRow};
use crate::{Database, now};

const ANNOUNCEMENT_COLUMNS: &str =
    "id, title, content, created_by, is_active, priority, created_at, updated_at";

fn map_announcement(row: &Row<'_>) -> rusqlite::Result<AnnouncementRow> {
    Ok(AnnouncementRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_by: row.get(3)?,
        is_active: row.get(4)?,
        priority: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn query_announcement(conn: &Connection, id: &str) -> Result<Option<AnnouncementRow>> {
    let sql = format!("SELECT {} FROM announcements WHERE id = ?1", ANNOUNCEMENT_COLUMNS);
    Ok(conn.query_row(&sql, [id], map_announcement).optional()?)
}

impl Database {
    // -- Announcements --

    pub fn create_announcement(
        &self,
        id: &str,
        title: &str,
        content: &str,
        created_by: &str,
        priority: i64,
        is_active: bool,
    ) -> Result<AnnouncementRow> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO announcements (id, title, content, created_by, is_active, priority, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![id, title, content, created_by, is_active, priority, ts],
            )?;
            query_announcement(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Announcement vanished after insert: {}", id))
        })
    }

    pub fn get_announcement(&self, id: &str) -> Result<Option<AnnouncementRow>> {
        self.with_conn(|conn| query_announcement(conn, id))
    }

    /// Highest priority first, then newest.
    pub fn list_announcements(&self, active_only: bool) -> Result<Vec<AnnouncementRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM announcements WHERE (?1 = 0 OR is_active = 1)
                 ORDER BY priority DESC, created_at DESC",
                ANNOUNCEMENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([active_only], map_announcement)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_announcement(
        &self,
        id: &str,
        changes: &AnnouncementChanges,
    ) -> Result<Option<AnnouncementRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE announcements SET
                    title = COALESCE(?2, title),
                    content = COALESCE(?3, content),
                    priority = COALESCE(?4, priority),
                    is_active = COALESCE(?5, is_active),
                    updated_at = ?6
                 WHERE id = ?1",
                params![
                    id,
                    changes.title,
                    changes.content,
                    changes.priority,
                    changes.is_active,
                    now()
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_announcement(conn, id)
        })
    }

    pub fn delete_announcement(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM announcements WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Resolves an author id that may name an admin account or a user.
    pub fn author_by_id(&self, id: &str) -> Result<Option<AuthorRow>> {
        self.with_conn(|conn| {
            let admin = conn
                .query_row("SELECT id, username FROM admins WHERE id = ?1", [id], |r| {
                    Ok(AuthorRow {
                        id: r.get(0)?,
                        username: r.get(1)?,
                        avatar_url: None,
                    })
                })
                .optional()?;
            if admin.is_some() {
                return Ok(admin);
            }
            Ok(conn
                .query_row("SELECT id, username, avatar_url FROM users WHERE id = ?1", [id], |r| {
                    Ok(AuthorRow {
                        id: r.get(0)?,
                        username: r.get(1)?,
                        avatar_url: r.get(2)?,
                    })
                })
                .optional()?)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::models::AnnouncementChanges;

    #[test]
    fn listing_orders_by_priority_then_recency() {
        let db = Database::open_in_memory().unwrap();
        db.create_announcement("low", "Low", "body", "a1", 0, true).unwrap();
        db.create_announcement("high", "High", "body", "a1", 9, true).unwrap();
        db.create_announcement("hidden", "Hidden", "body", "a1", 10, false).unwrap();

        let active: Vec<_> = db.list_announcements(true).unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(active, vec!["high", "low"]);
        assert_eq!(db.list_announcements(false).unwrap()[0].id, "hidden");
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let db = Database::open_in_memory().unwrap();
        db.create_announcement("a", "Title", "body", "a1", 3, true).unwrap();

        let changes = AnnouncementChanges {
            is_active: Some(false),
            ..Default::default()
        };
        let updated = db.update_announcement("a", &changes).unwrap().unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.priority, 3);
        assert_eq!(updated.title, "Title");
        assert!(db.update_announcement("missing", &changes).unwrap().is_none());
    }

    #[test]
    fn author_prefers_admin_accounts() {
        let db = Database::open_in_memory().unwrap();
        db.create_admin("a1", "root@example.com", Some("root"), "hash").unwrap();
        db.create_user("u1", "u1@example.com", "alice", "hash").unwrap();

        assert_eq!(db.author_by_id("a1").unwrap().unwrap().username.as_deref(), Some("root"));
        assert_eq!(db.author_by_id("u1").unwrap().unwrap().username.as_deref(), Some("alice"));
        assert!(db.author_by_id("nobody").unwrap().is_none());
    }
}
