use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

use crate::models::AdminRow;
use crate::{Database, now};

const ADMIN_COLUMNS: &str = "id, email, username, password_hash, is_active, last_login_at, created_at";

fn map_admin(row: &Row<'_>) -> rusqlite::Result<AdminRow> {
    Ok(AdminRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get(4)?,
        last_login_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Database {
    // -- Admin accounts --

    pub fn create_admin(
        &self,
        id: &str,
        email: &str,
        username: Option<&str>,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO admins (id, email, username, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, email, username, password_hash, now()],
            )?;
            Ok(())
        })
    }

    /// Inserts the account only while the `admins` table is empty. Returns
    /// false when an admin already exists.
    pub fn create_first_admin(
        &self,
        id: &str,
        email: &str,
        username: Option<&str>,
        password_hash: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO admins (id, email, username, password_hash, created_at)
                 SELECT ?1, ?2, ?3, ?4, ?5 WHERE NOT EXISTS (SELECT 1 FROM admins)",
                params![id, email, username, password_hash, now()],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn has_admins(&self) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT EXISTS (SELECT 1 FROM admins)", [], |r| r.get(0))?)
        })
    }

    pub fn get_admin_by_email(&self, email: &str) -> Result<Option<AdminRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM admins WHERE email = ?1", ADMIN_COLUMNS);
            Ok(conn.query_row(&sql, [email], map_admin).optional()?)
        })
    }

    /// Looks up an active admin by the id and email pair sent in the admin
    /// credential headers.
    pub fn get_active_admin(&self, id: &str, email: &str) -> Result<Option<AdminRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM admins WHERE id = ?1 AND email = ?2 AND is_active = 1",
                ADMIN_COLUMNS
            );
            Ok(conn.query_row(&sql, params![id, email], map_admin).optional()?)
        })
    }

    pub fn touch_admin_login(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE admins SET last_login_at = ?2 WHERE id = ?1", params![id, now()])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn admin_lookup_requires_matching_pair() {
        let db = Database::open_in_memory().unwrap();
        db.create_admin("a1", "root@example.com", Some("root"), "hash").unwrap();

        assert!(db.get_active_admin("a1", "root@example.com").unwrap().is_some());
        assert!(db.get_active_admin("a1", "other@example.com").unwrap().is_none());

        db.touch_admin_login("a1").unwrap();
        let admin = db.get_admin_by_email("ROOT@example.com").unwrap().unwrap();
        assert!(admin.last_login_at.is_some());
    }

    #[test]
    fn only_the_first_admin_bootstraps() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.has_admins().unwrap());

        assert!(db.create_first_admin("a1", "root@example.com", None, "hash").unwrap());
        assert!(db.has_admins().unwrap());
        assert!(!db.create_first_admin("a2", "second@example.com", None, "hash").unwrap());
        assert!(db.get_admin_by_email("second@example.com").unwrap().is_none());
    }
}
