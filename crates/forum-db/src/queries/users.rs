use anyhow::Result;
use forum_types::models::level_for_points;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::models::{UserChanges, UserRow};
use crate::queries::points::award_in;
use crate::{Database, now};

const USER_COLUMNS: &str = "id, email, username, password, avatar_url, role, total_points, level, last_login_date, created_at";

/// Roles hidden from public leaderboards and the default admin user list.
const STAFF_FILTER: &str = "role NOT IN ('moderator', 'admin', 'superadmin')
    AND email NOT IN (SELECT email FROM admins WHERE is_active = 1)";

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        avatar_url: row.get(4)?,
        role: row.get(5)?,
        total_points: row.get(6)?,
        level: row.get(7)?,
        last_login_date: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub(crate) fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, [id], map_user).optional()?)
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, username, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, email, username, password_hash, now()],
            )?;
            query_user_by_id(conn, id)?.ok_or_else(|| anyhow::anyhow!("User vanished after insert: {}", id))
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
            Ok(conn.query_row(&sql, [email], map_user).optional()?)
        })
    }

    /// Newest users first, optionally hiding staff accounts.
    pub fn list_users(&self, limit: i64, exclude_staff: bool) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let filter = if exclude_staff { STAFF_FILTER } else { "1 = 1" };
            let sql = format!(
                "SELECT {} FROM users WHERE {} ORDER BY created_at DESC LIMIT ?1",
                USER_COLUMNS, filter
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], map_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_users_by_role(
        &self,
        limit: i64,
        offset: i64,
        role: Option<&str>,
    ) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE (?1 IS NULL OR role = ?1)
                 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![role, limit, offset], map_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Highest balances first, staff excluded.
    pub fn top_users(&self, limit: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE {} ORDER BY total_points DESC, created_at ASC LIMIT ?1",
                USER_COLUMNS, STAFF_FILTER
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], map_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// `avatar_url`: outer `None` leaves it alone, `Some(None)` clears it.
    pub fn update_profile(
        &self,
        id: &str,
        username: Option<&str>,
        avatar_url: Option<Option<&str>>,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            if let Some(username) = username {
                conn.execute("UPDATE users SET username = ?2 WHERE id = ?1", params![id, username])?;
            }
            if let Some(avatar_url) = avatar_url {
                conn.execute("UPDATE users SET avatar_url = ?2 WHERE id = ?1", params![id, avatar_url])?;
            }
            query_user_by_id(conn, id)
        })
    }

    /// Admin edit. Setting the balance also recomputes the level.
    pub fn update_user(&self, id: &str, changes: &UserChanges) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if query_user_by_id(&tx, id)?.is_none() {
                return Ok(None);
            }
            if let Some(username) = &changes.username {
                tx.execute("UPDATE users SET username = ?2 WHERE id = ?1", params![id, username])?;
            }
            if let Some(email) = &changes.email {
                tx.execute("UPDATE users SET email = ?2 WHERE id = ?1", params![id, email])?;
            }
            if let Some(hash) = &changes.password_hash {
                tx.execute("UPDATE users SET password = ?2 WHERE id = ?1", params![id, hash])?;
            }
            if let Some(total) = changes.total_points {
                tx.execute(
                    "UPDATE users SET total_points = ?2, level = ?3 WHERE id = ?1",
                    params![id, total, level_for_points(total)],
                )?;
            }
            let user = query_user_by_id(&tx, id)?;
            tx.commit()?;
            Ok(user)
        })
    }

    pub fn set_user_role(&self, id: &str, role: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE users SET role = ?2 WHERE id = ?1", params![id, role])?;
            Ok(changed > 0)
        })
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Returns `(ranking, total_users, total_points)`. Ranking is one more
    /// than the number of users with a strictly higher balance.
    pub fn ranking(&self, user_id: &str) -> Result<(i64, i64, i64)> {
        self.with_conn(|conn| {
            let total_users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            if total_users == 0 {
                return Ok((0, 0, 0));
            }
            let points: i64 = conn
                .query_row("SELECT total_points FROM users WHERE id = ?1", [user_id], |r| r.get(0))
                .optional()?
                .unwrap_or(0);
            let higher: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE total_points > ?1",
                [points],
                |r| r.get(0),
            )?;
            Ok((higher + 1, total_users, points))
        })
    }

    /// Stamps today's login and pays the daily bonus the first time per day.
    /// Returns whether the bonus was paid.
    pub fn record_daily_login(&self, user_id: &str, today: &str, bonus: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE users SET last_login_date = ?2
                 WHERE id = ?1 AND (last_login_date IS NULL OR last_login_date != ?2)",
                params![user_id, today],
            )?;
            let paid = changed > 0 && award_in(&tx, user_id, bonus, "daily login")?.is_some();
            tx.commit()?;
            if paid {
                debug!(user_id, "Daily login bonus awarded");
            }
            Ok(paid)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::models::UserChanges;

    fn seed(db: &Database, id: &str, email: &str) {
        db.create_user(id, email, id, "hash").unwrap();
    }

    #[test]
    fn daily_login_pays_once_per_day() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "u1", "u1@example.com");

        assert!(db.record_daily_login("u1", "2025-05-01", 1).unwrap());
        assert!(!db.record_daily_login("u1", "2025-05-01", 1).unwrap());
        assert!(db.record_daily_login("u1", "2025-05-02", 1).unwrap());

        let user = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.total_points, 2);
        assert_eq!(user.last_login_date.as_deref(), Some("2025-05-02"));
    }

    #[test]
    fn ranking_counts_strictly_higher_balances() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.ranking("nobody").unwrap(), (0, 0, 0));

        seed(&db, "a", "a@example.com");
        seed(&db, "b", "b@example.com");
        seed(&db, "c", "c@example.com");
        db.award_points("a", 50, "test").unwrap();
        db.award_points("b", 50, "test").unwrap();
        db.award_points("c", 80, "test").unwrap();

        assert_eq!(db.ranking("c").unwrap(), (1, 3, 80));
        assert_eq!(db.ranking("a").unwrap(), (2, 3, 50));
        assert_eq!(db.ranking("b").unwrap(), (2, 3, 50));
    }

    #[test]
    fn setting_points_recomputes_level() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "u1", "u1@example.com");

        let changes = UserChanges {
            total_points: Some(420),
            ..Default::default()
        };
        let user = db.update_user("u1", &changes).unwrap().unwrap();
        assert_eq!(user.total_points, 420);
        assert_eq!(user.level, 5);
        assert!(db.update_user("missing", &changes).unwrap().is_none());
    }

    #[test]
    fn top_users_skip_staff() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "mod", "mod@example.com");
        seed(&db, "u1", "u1@example.com");
        db.award_points("mod", 500, "test").unwrap();
        db.award_points("u1", 5, "test").unwrap();
        db.set_user_role("mod", "moderator").unwrap();

        let top = db.top_users(5).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, "u1");
    }

    #[test]
    fn deleting_a_user_cascades() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "u1", "u1@example.com");
        db.award_points("u1", 10, "test").unwrap();

        assert!(db.delete_user("u1").unwrap());
        assert!(db.get_user_by_id("u1").unwrap().is_none());
        assert!(db.point_history("u1", 10).unwrap().is_empty());
        assert!(!db.delete_user("u1").unwrap());
    }
}
