//! Queries grouped by table family. Each submodule adds methods to
//! [`crate::Database`].

mod admins;
mod announcements;
mod line_groups;
mod points;
mod posts;
mod replies;
mod reports;
mod stats;
mod uploads;
mod users;
mod votes;

use rusqlite::Row;

use crate::models::AuthorRow;

/// `?start, ?start+1, ...` for an `IN (...)` list.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reads the three joined author columns starting at `idx`. A LEFT JOIN with
/// no match yields `None`.
pub(crate) fn author_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<AuthorRow>> {
    let id: Option<String> = row.get(idx)?;
    Ok(match id {
        Some(id) => Some(AuthorRow {
            id,
            username: row.get(idx + 1)?,
            avatar_url: row.get(idx + 2)?,
        }),
        None => None,
    })
}

/// Order applied to applications and reports: pending first, newest next.
pub(crate) fn pending_first(alias: &str) -> String {
    format!(
        "CASE {a}.status WHEN 'pending' THEN 0 ELSE 1 END, {a}.created_at DESC",
        a = alias
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_list() {
        assert_eq!(placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(placeholders(2, 1), "?2");
        assert_eq!(placeholders(1, 0), "");
    }

    #[test]
    fn pending_first_qualifies_columns() {
        assert_eq!(
            pending_first("a"),
            "CASE a.status WHEN 'pending' THEN 0 ELSE 1 END, a.created_at DESC"
        );
    }
}
