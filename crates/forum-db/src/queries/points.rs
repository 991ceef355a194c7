use anyhow::Result;
use forum_types::models::level_for_points;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::models::{Deduction, PointRecordRow};
use crate::{Database, new_id, now};

fn balance(conn: &Connection, user_id: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row("SELECT total_points FROM users WHERE id = ?1", [user_id], |r| r.get(0))
        .optional()?)
}

/// Credits `points` and writes the ledger row. Returns the new balance, or
/// `None` when nothing was awarded.
pub(crate) fn award_in(
    conn: &Connection,
    user_id: &str,
    points: i64,
    reason: &str,
) -> Result<Option<i64>> {
    if points <= 0 {
        return Ok(None);
    }
    let Some(current) = balance(conn, user_id)? else {
        return Ok(None);
    };

    let total = current + points;
    conn.execute(
        "INSERT INTO point_records (id, user_id, points, reason, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![new_id(), user_id, points, reason, now()],
    )?;
    conn.execute(
        "UPDATE users SET total_points = ?2, level = ?3 WHERE id = ?1",
        params![user_id, total, level_for_points(total)],
    )?;
    Ok(Some(total))
}

/// Charges `points` if the balance covers it.
pub(crate) fn deduct_in(
    conn: &Connection,
    user_id: &str,
    points: i64,
    reason: &str,
) -> Result<Deduction> {
    let Some(current) = balance(conn, user_id)? else {
        return Ok(Deduction::UnknownUser);
    };
    if points <= 0 || current < points {
        return Ok(Deduction::Insufficient { current });
    }

    let total = current - points;
    conn.execute(
        "INSERT INTO point_records (id, user_id, points, reason, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![new_id(), user_id, -points, reason, now()],
    )?;
    conn.execute(
        "UPDATE users SET total_points = ?2, level = ?3 WHERE id = ?1",
        params![user_id, total, level_for_points(total)],
    )?;
    Ok(Deduction::Applied { total })
}

impl Database {
    // -- Points --

    pub fn award_points(&self, user_id: &str, points: i64, reason: &str) -> Result<Option<i64>> {
        let awarded = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let total = award_in(&tx, user_id, points, reason)?;
            tx.commit()?;
            Ok(total)
        })?;
        if let Some(total) = awarded {
            info!(user_id, points, reason, total, "Points awarded");
        }
        Ok(awarded)
    }

    pub fn deduct_points(&self, user_id: &str, points: i64, reason: &str) -> Result<Deduction> {
        let outcome = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let outcome = deduct_in(&tx, user_id, points, reason)?;
            tx.commit()?;
            Ok(outcome)
        })?;
        if let Deduction::Applied { total } = outcome {
            info!(user_id, points, reason, total, "Points deducted");
        }
        Ok(outcome)
    }

    /// Newest ledger rows first.
    pub fn point_history(&self, user_id: &str, limit: i64) -> Result<Vec<PointRecordRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, points, reason, created_at FROM point_records
                 WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![user_id, limit], |row| {
                    Ok(PointRecordRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        points: row.get(2)?,
                        reason: row.get(3)?,
                        created_at: row.get(4)?,
                        username: None,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Most recent ledger activity across all users.
    pub fn recent_point_records(&self, limit: i64) -> Result<Vec<PointRecordRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT pr.id, pr.user_id, pr.points, pr.reason, pr.created_at, u.username
                 FROM point_records pr LEFT JOIN users u ON u.id = pr.user_id
                 ORDER BY pr.created_at DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(PointRecordRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        points: row.get(2)?,
                        reason: row.get(3)?,
                        created_at: row.get(4)?,
                        username: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
