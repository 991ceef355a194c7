use std::collections::HashMap;

use anyhow::Result;
use forum_types::models::{ReviewDecision, STATUS_PENDING};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use crate::models::{
    ApplyOutcome, CreationRequestRow, CreationReviewOutcome, Deduction, GroupApplicationRow,
    GroupCreation, GroupReportRow, LineApplicationRow, LineGroupChanges, LineGroupRow,
    NewLineGroup,
};
use crate::queries::points::{award_in, deduct_in};
use crate::queries::{author_at, pending_first, placeholders};
use crate::{Database, new_id, now};

const GROUP_SELECT: &str = "
    SELECT g.id, g.name, g.description, g.qr_code_url, g.manager_id, g.is_active,
           g.is_private, g.admin_approved, g.member_count, g.created_at, g.updated_at,
           u.id, u.username, u.avatar_url
    FROM line_groups g LEFT JOIN users u ON u.id = g.manager_id";

const APPLICATION_SELECT: &str = "
    SELECT a.id, a.user_id, a.group_id, a.message, a.status, a.reviewed_by,
           a.reviewed_at, a.created_at, u.id, u.username, u.avatar_url
    FROM line_group_applications a LEFT JOIN users u ON u.id = a.user_id";

const REPORT_SELECT: &str = "
    SELECT gr.id, gr.group_id, gr.reporter_id, gr.reason, gr.description, gr.status,
           gr.reviewed_by, gr.reviewed_at, gr.created_at, u.id, u.username, u.avatar_url
    FROM line_group_reports gr LEFT JOIN users u ON u.id = gr.reporter_id";

const REQUEST_SELECT: &str = "
    SELECT cr.id, cr.requester_id, cr.name, cr.description, cr.qr_code_url, cr.is_private,
           cr.status, cr.reviewed_by, cr.reviewed_at, cr.rejection_reason, cr.created_at,
           cr.updated_at, u.id, u.username, u.avatar_url
    FROM line_group_creation_requests cr LEFT JOIN users u ON u.id = cr.requester_id";

fn map_group(row: &Row<'_>) -> rusqlite::Result<LineGroupRow> {
    Ok(LineGroupRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        qr_code_url: row.get(3)?,
        manager_id: row.get(4)?,
        is_active: row.get(5)?,
        is_private: row.get(6)?,
        admin_approved: row.get(7)?,
        member_count: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        manager: author_at(row, 11)?,
    })
}

fn map_application(row: &Row<'_>) -> rusqlite::Result<GroupApplicationRow> {
    Ok(GroupApplicationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        group_id: row.get(2)?,
        message: row.get(3)?,
        status: row.get(4)?,
        reviewed_by: row.get(5)?,
        reviewed_at: row.get(6)?,
        created_at: row.get(7)?,
        applicant: author_at(row, 8)?,
    })
}

fn map_group_report(row: &Row<'_>) -> rusqlite::Result<GroupReportRow> {
    Ok(GroupReportRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        reporter_id: row.get(2)?,
        reason: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        reviewed_by: row.get(6)?,
        reviewed_at: row.get(7)?,
        created_at: row.get(8)?,
        reporter: author_at(row, 9)?,
    })
}

fn map_request(row: &Row<'_>) -> rusqlite::Result<CreationRequestRow> {
    Ok(CreationRequestRow {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        qr_code_url: row.get(4)?,
        is_private: row.get(5)?,
        status: row.get(6)?,
        reviewed_by: row.get(7)?,
        reviewed_at: row.get(8)?,
        rejection_reason: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        requester: author_at(row, 12)?,
    })
}

fn query_group(conn: &Connection, id: &str) -> Result<Option<LineGroupRow>> {
    let sql = format!("{} WHERE g.id = ?1", GROUP_SELECT);
    Ok(conn.query_row(&sql, [id], map_group).optional()?)
}

fn query_application(conn: &Connection, id: &str) -> Result<Option<GroupApplicationRow>> {
    let sql = format!("{} WHERE a.id = ?1", APPLICATION_SELECT);
    Ok(conn.query_row(&sql, [id], map_application).optional()?)
}

fn query_group_report(conn: &Connection, id: &str) -> Result<Option<GroupReportRow>> {
    let sql = format!("{} WHERE gr.id = ?1", REPORT_SELECT);
    Ok(conn.query_row(&sql, [id], map_group_report).optional()?)
}

fn query_request(conn: &Connection, id: &str) -> Result<Option<CreationRequestRow>> {
    let sql = format!("{} WHERE cr.id = ?1", REQUEST_SELECT);
    Ok(conn.query_row(&sql, [id], map_request).optional()?)
}

fn insert_group(conn: &Connection, id: &str, group: &NewLineGroup<'_>) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO line_groups
            (id, name, description, qr_code_url, manager_id, is_private, admin_approved, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
        params![
            id,
            group.name,
            group.description,
            group.qr_code_url,
            group.manager_id,
            group.is_private,
            ts
        ],
    )?;
    Ok(())
}

fn collect_applications(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<GroupApplicationRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_application)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database {
    // -- LINE applications --

    pub fn create_line_application(
        &self,
        id: &str,
        user_id: &str,
        message: &str,
    ) -> Result<LineApplicationRow> {
        self.with_conn(|conn| {
            let created_at = now();
            conn.execute(
                "INSERT INTO line_applications (id, user_id, message, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, message, STATUS_PENDING, created_at],
            )?;
            Ok(LineApplicationRow {
                id: id.to_string(),
                user_id: user_id.to_string(),
                message: message.to_string(),
                status: STATUS_PENDING.to_string(),
                created_at,
            })
        })
    }

    // -- LINE groups --

    /// Admin-approved groups, newest first.
    pub fn list_line_groups(&self, active_only: bool) -> Result<Vec<LineGroupRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE g.admin_approved = 1 AND (?1 = 0 OR g.is_active = 1) ORDER BY g.created_at DESC",
                GROUP_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([active_only], map_group)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_line_group(&self, id: &str) -> Result<Option<LineGroupRow>> {
        self.with_conn(|conn| query_group(conn, id))
    }

    pub fn line_groups_by_ids(&self, ids: &[String]) -> Result<HashMap<String, LineGroupRow>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.with_conn(|conn| {
            let sql = format!("{} WHERE g.id IN ({})", GROUP_SELECT, placeholders(1, ids.len()));
            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();
            let rows = stmt
                .query_map(params.as_slice(), map_group)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(|g| (g.id.clone(), g)).collect())
        })
    }

    /// Creates an approved group on behalf of staff. A private group costs
    /// `private_cost`; the manager earns `reward` either way.
    pub fn create_line_group(
        &self,
        id: &str,
        group: &NewLineGroup<'_>,
        private_cost: i64,
        reward: i64,
    ) -> Result<GroupCreation> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if group.is_private {
                match deduct_in(&tx, group.manager_id, private_cost, "create private group")? {
                    Deduction::Applied { .. } => {}
                    Deduction::Insufficient { current } => {
                        return Ok(GroupCreation::Insufficient { current });
                    }
                    Deduction::UnknownUser => return Ok(GroupCreation::Insufficient { current: 0 }),
                }
            }
            insert_group(&tx, id, group)?;
            award_in(&tx, group.manager_id, reward, "create group")?;
            let row = query_group(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("Group vanished after insert: {}", id))?;
            tx.commit()?;
            info!(group_id = id, manager_id = group.manager_id, "LINE group created");
            Ok(GroupCreation::Created(row))
        })
    }

    pub fn update_line_group(&self, id: &str, changes: &LineGroupChanges) -> Result<Option<LineGroupRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE line_groups SET
                    name = COALESCE(?2, name),
                    description = COALESCE(?3, description),
                    qr_code_url = COALESCE(?4, qr_code_url),
                    is_active = COALESCE(?5, is_active),
                    updated_at = ?6
                 WHERE id = ?1",
                params![
                    id,
                    changes.name,
                    changes.description,
                    changes.qr_code_url,
                    changes.is_active,
                    now()
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_group(conn, id)
        })
    }

    pub fn delete_line_group(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM line_groups WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Group applications --

    pub fn apply_to_group(
        &self,
        id: &str,
        user_id: &str,
        group_id: &str,
        message: Option<&str>,
    ) -> Result<ApplyOutcome> {
        self.with_conn(|conn| {
            let active: Option<bool> = conn
                .query_row("SELECT is_active FROM line_groups WHERE id = ?1", [group_id], |r| r.get(0))
                .optional()?;
            match active {
                None => return Ok(ApplyOutcome::GroupNotFound),
                Some(false) => return Ok(ApplyOutcome::GroupInactive),
                Some(true) => {}
            }

            let mut stmt = conn.prepare(
                "SELECT status FROM line_group_applications WHERE user_id = ?1 AND group_id = ?2",
            )?;
            let statuses = stmt
                .query_map(params![user_id, group_id], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            if statuses.iter().any(|s| s == STATUS_PENDING) {
                return Ok(ApplyOutcome::AlreadyPending);
            }
            if statuses.iter().any(|s| s == ReviewDecision::Approved.as_str()) {
                return Ok(ApplyOutcome::AlreadyApproved);
            }

            conn.execute(
                "INSERT INTO line_group_applications (id, user_id, group_id, message, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, user_id, group_id, message, STATUS_PENDING, now()],
            )?;
            Ok(ApplyOutcome::Created)
        })
    }

    pub fn get_group_application(&self, id: &str) -> Result<Option<GroupApplicationRow>> {
        self.with_conn(|conn| query_application(conn, id))
    }

    /// Applications to one group, pending first.
    pub fn applications_for_group(
        &self,
        group_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<GroupApplicationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE a.group_id = ?1 AND (?2 IS NULL OR a.status = ?2) ORDER BY {}",
                APPLICATION_SELECT,
                pending_first("a")
            );
            collect_applications(conn, &sql, params![group_id, status])
        })
    }

    /// The caller's own applications, newest first.
    pub fn applications_for_user(
        &self,
        user_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<GroupApplicationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE a.user_id = ?1 AND (?2 IS NULL OR a.status = ?2) ORDER BY a.created_at DESC",
                APPLICATION_SELECT
            );
            collect_applications(conn, &sql, params![user_id, status])
        })
    }

    /// Applications to the active groups managed by `manager_id`.
    pub fn applications_for_manager(
        &self,
        manager_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<GroupApplicationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE a.group_id IN (SELECT id FROM line_groups WHERE manager_id = ?1 AND is_active = 1)
                   AND (?2 IS NULL OR a.status = ?2)
                 ORDER BY {}",
                APPLICATION_SELECT,
                pending_first("a")
            );
            collect_applications(conn, &sql, params![manager_id, status])
        })
    }

    /// One page across every group, pending first, plus the total.
    pub fn list_group_applications(
        &self,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<GroupApplicationRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM line_group_applications WHERE (?1 IS NULL OR status = ?1)",
                [status],
                |r| r.get(0),
            )?;
            let sql = format!(
                "{} WHERE (?1 IS NULL OR a.status = ?1) ORDER BY {} LIMIT ?2 OFFSET ?3",
                APPLICATION_SELECT,
                pending_first("a")
            );
            let rows = collect_applications(conn, &sql, params![status, limit, offset])?;
            Ok((rows, total))
        })
    }

    /// Records the decision. Approving an application that was not already
    /// approved adds a member to the group.
    pub fn review_group_application(
        &self,
        id: &str,
        reviewer_id: &str,
        decision: ReviewDecision,
    ) -> Result<Option<GroupApplicationRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(before) = query_application(&tx, id)? else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE line_group_applications SET status = ?2, reviewed_by = ?3, reviewed_at = ?4 WHERE id = ?1",
                params![id, decision.as_str(), reviewer_id, now()],
            )?;
            // member_count follows transitions into and out of approved
            let was_approved = before.status == ReviewDecision::Approved.as_str();
            match decision {
                ReviewDecision::Approved if !was_approved => {
                    tx.execute(
                        "UPDATE line_groups SET member_count = member_count + 1 WHERE id = ?1",
                        [&before.group_id],
                    )?;
                }
                ReviewDecision::Rejected if was_approved => {
                    tx.execute(
                        "UPDATE line_groups SET member_count = MAX(member_count - 1, 0) WHERE id = ?1",
                        [&before.group_id],
                    )?;
                }
                _ => {}
            }
            let after = query_application(&tx, id)?;
            tx.commit()?;
            Ok(after)
        })
    }

    // -- Group reports --

    pub fn create_group_report(
        &self,
        id: &str,
        group_id: &str,
        reporter_id: &str,
        reason: &str,
        description: Option<&str>,
    ) -> Result<GroupReportRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO line_group_reports (id, group_id, reporter_id, reason, description, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, group_id, reporter_id, reason, description, STATUS_PENDING, now()],
            )?;
            query_group_report(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Report vanished after insert: {}", id))
        })
    }

    pub fn list_group_reports(&self, status: Option<&str>) -> Result<Vec<GroupReportRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (?1 IS NULL OR gr.status = ?1) ORDER BY {}",
                REPORT_SELECT,
                pending_first("gr")
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([status], map_group_report)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn review_group_report(
        &self,
        id: &str,
        reviewer_id: &str,
        status: &str,
    ) -> Result<Option<GroupReportRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE line_group_reports SET status = ?2, reviewed_by = ?3, reviewed_at = ?4 WHERE id = ?1",
                params![id, status, reviewer_id, now()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_group_report(conn, id)
        })
    }

    // -- Group creation requests --

    pub fn create_creation_request(
        &self,
        id: &str,
        requester_id: &str,
        group: &NewLineGroup<'_>,
    ) -> Result<CreationRequestRow> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO line_group_creation_requests
                    (id, requester_id, name, description, qr_code_url, is_private, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    id,
                    requester_id,
                    group.name,
                    group.description,
                    group.qr_code_url,
                    group.is_private,
                    STATUS_PENDING,
                    ts
                ],
            )?;
            query_request(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Creation request vanished after insert: {}", id))
        })
    }

    pub fn get_creation_request(&self, id: &str) -> Result<Option<CreationRequestRow>> {
        self.with_conn(|conn| query_request(conn, id))
    }

    /// All requests, or only those of `requester_id` when set. Newest first.
    pub fn list_creation_requests(
        &self,
        requester_id: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<CreationRequestRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (?1 IS NULL OR cr.requester_id = ?1) AND (?2 IS NULL OR cr.status = ?2)
                 ORDER BY cr.created_at DESC",
                REQUEST_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![requester_id, status], map_request)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Reviews a pending request. Approval creates the group with the
    /// requester as manager: a private group charges `private_cost`, a public
    /// one pays `reward`. Nothing changes when the charge cannot be covered.
    pub fn review_creation_request(
        &self,
        id: &str,
        reviewer_id: &str,
        decision: ReviewDecision,
        rejection_reason: Option<&str>,
        private_cost: i64,
        reward: i64,
    ) -> Result<CreationReviewOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(request) = query_request(&tx, id)? else {
                return Ok(CreationReviewOutcome::NotFound);
            };
            if request.status != STATUS_PENDING {
                return Ok(CreationReviewOutcome::AlreadyReviewed);
            }

            let ts = now();
            if decision == ReviewDecision::Rejected {
                tx.execute(
                    "UPDATE line_group_creation_requests
                     SET status = ?2, reviewed_by = ?3, reviewed_at = ?4, rejection_reason = ?5, updated_at = ?4
                     WHERE id = ?1",
                    params![id, decision.as_str(), reviewer_id, ts, rejection_reason],
                )?;
                tx.commit()?;
                return Ok(CreationReviewOutcome::Rejected);
            }

            if request.is_private {
                match deduct_in(&tx, &request.requester_id, private_cost, "create private group")? {
                    Deduction::Applied { .. } => {}
                    Deduction::Insufficient { current } => {
                        return Ok(CreationReviewOutcome::Insufficient { current });
                    }
                    Deduction::UnknownUser => {
                        return Ok(CreationReviewOutcome::Insufficient { current: 0 });
                    }
                }
            }

            let group_id = new_id();
            insert_group(
                &tx,
                &group_id,
                &NewLineGroup {
                    name: &request.name,
                    description: request.description.as_deref(),
                    qr_code_url: &request.qr_code_url,
                    manager_id: &request.requester_id,
                    is_private: request.is_private,
                },
            )?;
            if !request.is_private {
                award_in(&tx, &request.requester_id, reward, "create group")?;
            }
            tx.execute(
                "UPDATE line_group_creation_requests
                 SET status = ?2, reviewed_by = ?3, reviewed_at = ?4, updated_at = ?4
                 WHERE id = ?1",
                params![id, decision.as_str(), reviewer_id, ts],
            )?;
            tx.commit()?;
            info!(request_id = id, group_id = %group_id, "Creation request approved");
            Ok(CreationReviewOutcome::Approved { group_id })
        })
    }
}

#[cfg(test)]
mod tests {
    use forum_types::models::ReviewDecision;

    use crate::Database;
    use crate::models::{ApplyOutcome, CreationReviewOutcome, GroupCreation, NewLineGroup};

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("mgr", "mgr@example.com", "manager", "hash").unwrap();
        db.create_user("u1", "u1@example.com", "alice", "hash").unwrap();
        db
    }

    fn group(manager_id: &str, is_private: bool) -> NewLineGroup<'_> {
        NewLineGroup {
            name: "Study group",
            description: Some("weekly"),
            qr_code_url: "https://line.me/qr/abc",
            manager_id,
            is_private,
        }
    }

    fn created(outcome: GroupCreation) -> String {
        match outcome {
            GroupCreation::Created(row) => row.id,
            GroupCreation::Insufficient { current } => panic!("insufficient: {}", current),
        }
    }

    #[test]
    fn private_group_costs_points() {
        let db = setup();
        let outcome = db.create_line_group("g1", &group("mgr", true), 30, 20).unwrap();
        assert!(matches!(outcome, GroupCreation::Insufficient { current: 0 }));
        assert!(db.get_line_group("g1").unwrap().is_none());

        db.award_points("mgr", 30, "seed").unwrap();
        created(db.create_line_group("g1", &group("mgr", true), 30, 20).unwrap());
        // 30 - 30 + 20
        assert_eq!(db.get_user_by_id("mgr").unwrap().unwrap().total_points, 20);
    }

    #[test]
    fn apply_then_approve_counts_member_once() {
        let db = setup();
        let gid = created(db.create_line_group("g1", &group("mgr", false), 30, 20).unwrap());

        assert_eq!(db.apply_to_group("a1", "u1", &gid, None).unwrap(), ApplyOutcome::Created);
        assert_eq!(db.apply_to_group("a2", "u1", &gid, None).unwrap(), ApplyOutcome::AlreadyPending);

        db.review_group_application("a1", "mgr", ReviewDecision::Approved).unwrap().unwrap();
        db.review_group_application("a1", "mgr", ReviewDecision::Approved).unwrap().unwrap();
        assert_eq!(db.get_line_group(&gid).unwrap().unwrap().member_count, 1);
        assert_eq!(db.apply_to_group("a3", "u1", &gid, None).unwrap(), ApplyOutcome::AlreadyApproved);

        assert_eq!(db.apply_to_group("a4", "u1", "missing", None).unwrap(), ApplyOutcome::GroupNotFound);
    }

    #[test]
    fn revoking_an_approval_releases_the_seat() {
        let db = setup();
        let gid = created(db.create_line_group("g1", &group("mgr", false), 30, 20).unwrap());
        db.apply_to_group("a1", "u1", &gid, None).unwrap();

        db.review_group_application("a1", "mgr", ReviewDecision::Approved).unwrap().unwrap();
        assert_eq!(db.get_line_group(&gid).unwrap().unwrap().member_count, 1);

        let row = db.review_group_application("a1", "mgr", ReviewDecision::Rejected).unwrap().unwrap();
        assert_eq!(row.status, "rejected");
        assert_eq!(db.get_line_group(&gid).unwrap().unwrap().member_count, 0);

        // rejecting again changes nothing
        db.review_group_application("a1", "mgr", ReviewDecision::Rejected).unwrap().unwrap();
        assert_eq!(db.get_line_group(&gid).unwrap().unwrap().member_count, 0);
    }

    #[test]
    fn manager_sees_applications_for_active_groups() {
        let db = setup();
        let gid = created(db.create_line_group("g1", &group("mgr", false), 30, 20).unwrap());
        db.apply_to_group("a1", "u1", &gid, Some("hi")).unwrap();

        assert_eq!(db.applications_for_manager("mgr", None).unwrap().len(), 1);
        assert!(db.applications_for_manager("mgr", Some("approved")).unwrap().is_empty());
        assert_eq!(db.applications_for_user("u1", None).unwrap().len(), 1);

        let (page, total) = db.list_group_applications(None, 10, 0).unwrap();
        assert_eq!((page.len(), total), (1, 1));
    }

    #[test]
    fn creation_review_is_atomic() {
        let db = setup();
        let req = db.create_creation_request("cr1", "u1", &group("u1", true)).unwrap();
        assert_eq!(req.status, "pending");

        let outcome = db
            .review_creation_request("cr1", "mgr", ReviewDecision::Approved, None, 30, 20)
            .unwrap();
        assert_eq!(outcome, CreationReviewOutcome::Insufficient { current: 0 });
        assert_eq!(db.get_creation_request("cr1").unwrap().unwrap().status, "pending");
        assert!(db.list_line_groups(false).unwrap().is_empty());

        db.award_points("u1", 40, "seed").unwrap();
        let outcome = db
            .review_creation_request("cr1", "mgr", ReviewDecision::Approved, None, 30, 20)
            .unwrap();
        let CreationReviewOutcome::Approved { group_id } = outcome else {
            panic!("expected approval, got {:?}", outcome);
        };
        let group = db.get_line_group(&group_id).unwrap().unwrap();
        assert_eq!(group.manager_id, "u1");
        assert!(group.admin_approved);
        assert_eq!(db.get_user_by_id("u1").unwrap().unwrap().total_points, 10);

        assert_eq!(
            db.review_creation_request("cr1", "mgr", ReviewDecision::Rejected, None, 30, 20)
                .unwrap(),
            CreationReviewOutcome::AlreadyReviewed
        );
    }

    #[test]
    fn rejection_stores_reason() {
        let db = setup();
        db.create_creation_request("cr1", "u1", &group("u1", false)).unwrap();
        let outcome = db
            .review_creation_request("cr1", "mgr", ReviewDecision::Rejected, Some("duplicate"), 30, 20)
            .unwrap();
        assert_eq!(outcome, CreationReviewOutcome::Rejected);

        let req = db.get_creation_request("cr1").unwrap().unwrap();
        assert_eq!(req.status, "rejected");
        assert_eq!(req.rejection_reason.as_deref(), Some("duplicate"));
        assert_eq!(db.list_creation_requests(Some("u1"), Some("rejected")).unwrap().len(), 1);
        assert!(db.list_creation_requests(Some("mgr"), None).unwrap().is_empty());
    }

    #[test]
    fn group_report_review_sets_status() {
        let db = setup();
        let gid = created(db.create_line_group("g1", &group("mgr", false), 30, 20).unwrap());
        let report = db.create_group_report("gr1", &gid, "u1", "inappropriate content", None).unwrap();
        assert_eq!(report.status, "pending");

        let reviewed = db.review_group_report("gr1", "mgr", "resolved").unwrap().unwrap();
        assert_eq!(reviewed.status, "resolved");
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("mgr"));
        assert!(db.review_group_report("missing", "mgr", "resolved").unwrap().is_none());
    }
}
