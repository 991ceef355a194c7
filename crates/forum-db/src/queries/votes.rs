use anyhow::Result;
use forum_types::models::VoteType;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::VoteOutcome;
use crate::{Database, new_id, now};

/// Vote bookkeeping shared by posts and replies. Table and column names are
/// fixed strings, never user input.
struct VoteTarget {
    votes: &'static str,
    key: &'static str,
    counted: &'static str,
}

const POST_VOTES: VoteTarget = VoteTarget {
    votes: "post_votes",
    key: "post_id",
    counted: "posts",
};

const REPLY_VOTES: VoteTarget = VoteTarget {
    votes: "reply_votes",
    key: "reply_id",
    counted: "post_replies",
};

/// Same vote again removes it, a different vote replaces it, otherwise the
/// vote is inserted. Counters are then recomputed from the vote rows.
fn apply_vote(
    conn: &Connection,
    target: &VoteTarget,
    target_id: &str,
    user_id: &str,
    vote: VoteType,
) -> Result<VoteOutcome> {
    let existing: Option<(String, String)> = conn
        .query_row(
            &format!(
                "SELECT id, vote_type FROM {} WHERE {} = ?1 AND user_id = ?2",
                target.votes, target.key
            ),
            params![target_id, user_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    let (current, fresh) = match existing {
        Some((id, kind)) if kind == vote.as_str() => {
            conn.execute(&format!("DELETE FROM {} WHERE id = ?1", target.votes), [&id])?;
            (None, false)
        }
        Some((id, _)) => {
            conn.execute(
                &format!("UPDATE {} SET vote_type = ?2 WHERE id = ?1", target.votes),
                params![id, vote.as_str()],
            )?;
            (Some(vote), false)
        }
        None => {
            conn.execute(
                &format!(
                    "INSERT INTO {} (id, {}, user_id, vote_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    target.votes, target.key
                ),
                params![new_id(), target_id, user_id, vote.as_str(), now()],
            )?;
            (Some(vote), true)
        }
    };

    let (upvotes, downvotes): (i64, i64) = conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(vote_type = 'upvote'), 0), COALESCE(SUM(vote_type = 'downvote'), 0)
             FROM {} WHERE {} = ?1",
            target.votes, target.key
        ),
        [target_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    conn.execute(
        &format!(
            "UPDATE {} SET upvote_count = ?2, downvote_count = ?3 WHERE id = ?1",
            target.counted
        ),
        params![target_id, upvotes, downvotes],
    )?;

    Ok(VoteOutcome {
        upvote_count: upvotes,
        downvote_count: downvotes,
        current,
        fresh_upvote: fresh && vote == VoteType::Upvote,
    })
}

impl Database {
    // -- Votes --

    pub fn vote_post(&self, post_id: &str, user_id: &str, vote: VoteType) -> Result<VoteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let outcome = apply_vote(&tx, &POST_VOTES, post_id, user_id, vote)?;
            tx.commit()?;
            Ok(outcome)
        })
    }

    pub fn vote_reply(&self, reply_id: &str, user_id: &str, vote: VoteType) -> Result<VoteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let outcome = apply_vote(&tx, &REPLY_VOTES, reply_id, user_id, vote)?;
            tx.commit()?;
            Ok(outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    use forum_types::models::VoteType;

    use crate::Database;
    use crate::models::NewPost;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "u1@example.com", "alice", "hash").unwrap();
        db.create_user("u2", "u2@example.com", "bob", "hash").unwrap();
        let post = NewPost {
            title: "Thread",
            category: None,
            summary: None,
            cover_image_url: None,
            tags: None,
        };
        db.create_post("p1", "u1", &post).unwrap();
        db.create_reply("r1", "p1", None, "u1", "reply").unwrap();
        db
    }

    #[test]
    fn vote_toggles_and_switches() {
        let db = setup();

        let first = db.vote_post("p1", "u2", VoteType::Upvote).unwrap();
        assert_eq!((first.upvote_count, first.downvote_count), (1, 0));
        assert!(first.fresh_upvote);
        assert_eq!(first.current, Some(VoteType::Upvote));

        let switched = db.vote_post("p1", "u2", VoteType::Downvote).unwrap();
        assert_eq!((switched.upvote_count, switched.downvote_count), (0, 1));
        assert!(!switched.fresh_upvote);

        let removed = db.vote_post("p1", "u2", VoteType::Downvote).unwrap();
        assert_eq!((removed.upvote_count, removed.downvote_count), (0, 0));
        assert_eq!(removed.current, None);

        let post = db.get_post("p1").unwrap().unwrap();
        assert_eq!((post.upvote_count, post.downvote_count), (0, 0));
    }

    #[test]
    fn reply_votes_are_counted_per_reply() {
        let db = setup();
        db.vote_reply("r1", "u1", VoteType::Upvote).unwrap();
        let outcome = db.vote_reply("r1", "u2", VoteType::Upvote).unwrap();
        assert_eq!(outcome.upvote_count, 2);

        let votes = db.reply_votes_by_user("u2", "p1").unwrap();
        assert_eq!(votes.get("r1"), Some(&VoteType::Upvote));
        assert_eq!(db.get_reply("r1").unwrap().unwrap().upvote_count, 2);
    }
}
