use anyhow::Result;
use rusqlite::params;

use crate::Database;
use crate::models::SiteTotals;

impl Database {
    // -- Stats --

    /// Distinct authors of posts or replies created at or after `since`.
    pub fn active_members_since(&self, since: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM (
                    SELECT author_id FROM posts WHERE created_at >= ?1
                    UNION
                    SELECT author_id FROM post_replies WHERE created_at >= ?1
                 )",
                [since],
                |r| r.get(0),
            )?)
        })
    }

    /// Posts created in `[start, end)`.
    pub fn count_posts_between(&self, start: &str, end: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE created_at >= ?1 AND created_at < ?2",
                params![start, end],
                |r| r.get(0),
            )?)
        })
    }

    /// Users registered in `[start, end)`.
    pub fn count_users_between(&self, start: &str, end: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM users WHERE created_at >= ?1 AND created_at < ?2",
                params![start, end],
                |r| r.get(0),
            )?)
        })
    }

    pub fn site_totals(&self) -> Result<SiteTotals> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<i64> {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
            };
            Ok(SiteTotals {
                users: count("users")?,
                posts: count("posts")?,
                replies: count("post_replies")?,
                groups: count("line_groups")?,
                group_applications: count("line_group_applications")?,
                group_reports: count("line_group_reports")?,
            })
        })
    }

    /// `(role, count)` pairs for every role in use.
    pub fn role_distribution(&self) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")?;
            let rows = stmt
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::models::NewPost;
    use crate::Database;

    #[test]
    fn active_members_count_distinct_authors() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "u1@example.com", "alice", "hash").unwrap();
        db.create_user("u2", "u2@example.com", "bob", "hash").unwrap();
        db.create_user("u3", "u3@example.com", "carol", "hash").unwrap();
        let post = NewPost {
            title: "Thread",
            category: None,
            summary: None,
            cover_image_url: None,
            tags: None,
        };
        db.create_post("p1", "u1", &post).unwrap();
        db.create_reply("r1", "p1", None, "u1", "self reply").unwrap();
        db.create_reply("r2", "p1", None, "u2", "reply").unwrap();

        assert_eq!(db.active_members_since("0000").unwrap(), 2);
        assert_eq!(db.active_members_since("9999").unwrap(), 0);
        assert_eq!(db.count_posts_between("0000", "9999").unwrap(), 1);
        assert_eq!(db.count_users_between("0000", "9999").unwrap(), 3);

        let totals = db.site_totals().unwrap();
        assert_eq!((totals.users, totals.posts, totals.replies), (3, 1, 2));
        assert_eq!(db.role_distribution().unwrap(), vec![("user".to_string(), 3)]);
    }
}
