use std::collections::HashMap;

use anyhow::Result;
use forum_types::models::VoteType;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::ReplyRow;
use crate::queries::author_at;
use crate::{Database, now};

const REPLY_SELECT: &str = "
    SELECT r.id, r.post_id, r.parent_reply_id, r.author_id, r.content,
           r.upvote_count, r.downvote_count, r.created_at,
           u.id, u.username, u.avatar_url
    FROM post_replies r LEFT JOIN users u ON u.id = r.author_id";

fn map_reply(row: &Row<'_>) -> rusqlite::Result<ReplyRow> {
    Ok(ReplyRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_reply_id: row.get(2)?,
        author_id: row.get(3)?,
        content: row.get(4)?,
        upvote_count: row.get(5)?,
        downvote_count: row.get(6)?,
        created_at: row.get(7)?,
        author: author_at(row, 8)?,
    })
}

pub(crate) fn query_reply(conn: &Connection, id: &str) -> Result<Option<ReplyRow>> {
    let sql = format!("{} WHERE r.id = ?1", REPLY_SELECT);
    Ok(conn.query_row(&sql, [id], map_reply).optional()?)
}

impl Database {
    // -- Replies --

    pub fn create_reply(
        &self,
        id: &str,
        post_id: &str,
        parent_reply_id: Option<&str>,
        author_id: &str,
        content: &str,
    ) -> Result<ReplyRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO post_replies (id, post_id, parent_reply_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, post_id, parent_reply_id, author_id, content, now()],
            )?;
            query_reply(conn, id)?.ok_or_else(|| anyhow::anyhow!("Reply vanished after insert: {}", id))
        })
    }

    pub fn get_reply(&self, id: &str) -> Result<Option<ReplyRow>> {
        self.with_conn(|conn| query_reply(conn, id))
    }

    /// All replies of a post, oldest first.
    pub fn replies_for_post(&self, post_id: &str) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE r.post_id = ?1 ORDER BY r.created_at ASC", REPLY_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([post_id], map_reply)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// One page of a post's replies, newest first.
    pub fn replies_for_post_page(&self, post_id: &str, limit: i64, offset: i64) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE r.post_id = ?1 ORDER BY r.created_at DESC LIMIT ?2 OFFSET ?3",
                REPLY_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![post_id, limit, offset], map_reply)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replies left on any post written by `author_id`, newest first.
    pub fn replies_to_author(&self, author_id: &str, limit: i64) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE r.post_id IN (SELECT id FROM posts WHERE author_id = ?1)
                 ORDER BY r.created_at DESC LIMIT ?2",
                REPLY_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![author_id, limit], map_reply)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Viewer's votes on the replies of one post, keyed by reply id.
    pub fn reply_votes_by_user(&self, user_id: &str, post_id: &str) -> Result<HashMap<String, VoteType>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT v.reply_id, v.vote_type FROM reply_votes v
                 JOIN post_replies r ON r.id = v.reply_id
                 WHERE v.user_id = ?1 AND r.post_id = ?2",
            )?;
            let rows = stmt
                .query_map(params![user_id, post_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows
                .into_iter()
                .filter_map(|(id, vote)| vote.parse().ok().map(|v| (id, v)))
                .collect())
        })
    }
}
