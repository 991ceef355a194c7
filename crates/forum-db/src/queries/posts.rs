use std::collections::HashMap;

use anyhow::Result;
use forum_types::models::VoteType;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, warn};

use crate::models::{Deduction, NewPost, PinOutcome, PostRow, PostSort};
use crate::queries::points::deduct_in;
use crate::queries::{author_at, placeholders};
use crate::{Database, now};

const POST_SELECT: &str = "
    SELECT p.id, p.title, p.category, p.summary, p.cover_image_url, p.author_id, p.tags,
           p.view_count, p.upvote_count, p.downvote_count, p.is_closed, p.is_pinned,
           p.pinned_at, p.created_at, p.updated_at,
           (SELECT COUNT(*) FROM post_replies r WHERE r.post_id = p.id) AS reply_count,
           u.id, u.username, u.avatar_url
    FROM posts p LEFT JOIN users u ON u.id = p.author_id";

pub(crate) fn decode_tags(raw: Option<String>) -> Option<Vec<String>> {
    let raw = raw?;
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(tags) if !tags.is_empty() => Some(tags),
        Ok(_) => None,
        Err(e) => {
            warn!("Ignoring malformed tags column: {}", e);
            None
        }
    }
}

pub(crate) fn encode_tags(tags: Option<&[String]>) -> Result<Option<String>> {
    match tags {
        Some(tags) if !tags.is_empty() => Ok(Some(serde_json::to_string(tags)?)),
        _ => Ok(None),
    }
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        summary: row.get(3)?,
        cover_image_url: row.get(4)?,
        author_id: row.get(5)?,
        tags: decode_tags(row.get(6)?),
        view_count: row.get(7)?,
        upvote_count: row.get(8)?,
        downvote_count: row.get(9)?,
        is_closed: row.get(10)?,
        is_pinned: row.get(11)?,
        pinned_at: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        reply_count: row.get(15)?,
        author: author_at(row, 16)?,
    })
}

pub(crate) fn query_post(conn: &Connection, id: &str) -> Result<Option<PostRow>> {
    let sql = format!("{} WHERE p.id = ?1", POST_SELECT);
    Ok(conn.query_row(&sql, [id], map_post).optional()?)
}

fn order_clause(sort: PostSort) -> &'static str {
    match sort {
        PostSort::Latest => "p.is_pinned DESC, p.created_at DESC",
        PostSort::Views => "p.is_pinned DESC, p.view_count DESC, p.created_at DESC",
        PostSort::Replies => "p.is_pinned DESC, reply_count DESC, p.created_at DESC",
    }
}

impl Database {
    // -- Posts --

    pub fn create_post(&self, id: &str, author_id: &str, post: &NewPost<'_>) -> Result<PostRow> {
        let tags = encode_tags(post.tags)?;
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO posts (id, title, category, summary, cover_image_url, author_id, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    id,
                    post.title,
                    post.category,
                    post.summary,
                    post.cover_image_url,
                    author_id,
                    tags,
                    ts
                ],
            )?;
            query_post(conn, id)?.ok_or_else(|| anyhow::anyhow!("Post vanished after insert: {}", id))
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Returns one page of posts and the total count.
    pub fn list_posts(&self, sort: PostSort, limit: i64, offset: i64) -> Result<(Vec<PostRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))?;
            let sql = format!("{} ORDER BY {} LIMIT ?1 OFFSET ?2", POST_SELECT, order_clause(sort));
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit, offset], map_post)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((rows, total))
        })
    }

    pub fn list_posts_by_author(
        &self,
        author_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PostRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
                [author_id],
                |r| r.get(0),
            )?;
            let sql = format!(
                "{} WHERE p.author_id = ?1 ORDER BY {} LIMIT ?2 OFFSET ?3",
                POST_SELECT,
                order_clause(PostSort::Latest)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![author_id, limit, offset], map_post)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((rows, total))
        })
    }

    pub fn increment_view_count(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE posts SET view_count = view_count + 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn close_post(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET is_closed = 1, updated_at = ?2 WHERE id = ?1",
                params![id, now()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Unpins every post pinned before `cutoff`. Returns how many were cleared.
    pub fn clear_expired_pins(&self, cutoff: &str) -> Result<usize> {
        let cleared = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE posts SET is_pinned = 0, pinned_at = NULL
                 WHERE is_pinned = 1 AND pinned_at IS NOT NULL AND pinned_at < ?1",
                [cutoff],
            )?)
        })?;
        if cleared > 0 {
            debug!("Cleared {} expired pins", cleared);
        }
        Ok(cleared)
    }

    /// Pins a post for its owner, charging `cost` points. A pin placed at or
    /// after `live_since` is still running and blocks a new one.
    pub fn pin_post(
        &self,
        id: &str,
        user_id: &str,
        cost: i64,
        live_since: &str,
    ) -> Result<PinOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let row: Option<(String, bool, Option<String>)> = tx
                .query_row(
                    "SELECT author_id, is_pinned, pinned_at FROM posts WHERE id = ?1",
                    [id],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
                .optional()?;
            let Some((author_id, is_pinned, pinned_at)) = row else {
                return Ok(PinOutcome::NotFound);
            };

            let live = is_pinned && pinned_at.as_deref().is_none_or(|at| at >= live_since);
            if live {
                return Ok(PinOutcome::AlreadyPinned);
            }
            if author_id != user_id {
                return Ok(PinOutcome::NotOwner);
            }

            match deduct_in(&tx, user_id, cost, "pin post")? {
                Deduction::Applied { .. } => {}
                Deduction::Insufficient { current } => {
                    return Ok(PinOutcome::Insufficient { current });
                }
                Deduction::UnknownUser => {
                    return Ok(PinOutcome::Insufficient { current: 0 });
                }
            }

            let ts = now();
            tx.execute(
                "UPDATE posts SET is_pinned = 1, pinned_at = ?2, updated_at = ?2 WHERE id = ?1",
                params![id, ts],
            )?;
            tx.commit()?;
            Ok(PinOutcome::Pinned)
        })
    }

    /// Title substring search, newest first. Returns `(id, title, reply_count)`.
    pub fn similar_posts(&self, query: &str, limit: i64) -> Result<Vec<(String, String, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.title,
                        (SELECT COUNT(*) FROM post_replies r WHERE r.post_id = p.id)
                 FROM posts p
                 WHERE instr(lower(p.title), lower(?1)) > 0
                 ORDER BY p.created_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![query, limit], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Viewer's votes on the given posts, keyed by post id.
    pub fn post_votes_by_user(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> Result<HashMap<String, VoteType>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT post_id, vote_type FROM post_votes WHERE user_id = ?1 AND post_id IN ({})",
                placeholders(2, post_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&user_id];
            params.extend(post_ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows
                .into_iter()
                .filter_map(|(id, vote)| vote.parse().ok().map(|v| (id, v)))
                .collect())
        })
    }

    // -- Tags --

    /// Tag lists of the newest `limit` posts.
    pub fn recent_post_tags(&self, limit: i64) -> Result<Vec<Vec<String>>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT tags FROM posts ORDER BY created_at DESC LIMIT ?1")?;
            let rows = stmt
                .query_map([limit], |r| r.get::<_, Option<String>>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().filter_map(decode_tags).collect())
        })
    }

    /// Every post that carries at least one tag, as `(id, tags)`.
    pub fn tagged_posts(&self) -> Result<Vec<(String, Vec<String>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, tags FROM posts WHERE tags IS NOT NULL")?;
            let rows = stmt
                .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows
                .into_iter()
                .filter_map(|(id, raw)| decode_tags(raw).map(|tags| (id, tags)))
                .collect())
        })
    }

    /// Rewrites tag lists in one transaction. Returns the number of posts
    /// touched.
    pub fn update_post_tags(&self, updates: &[(String, Option<Vec<String>>)]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut updated = 0;
            {
                let mut stmt = tx.prepare("UPDATE posts SET tags = ?2 WHERE id = ?1")?;
                for (id, tags) in updates {
                    let encoded = encode_tags(tags.as_deref())?;
                    updated += stmt.execute(params![id, encoded])?;
                }
            }
            tx.commit()?;
            Ok(updated)
        })
    }
}
