//! Staff tag maintenance. Tags live as JSON arrays on posts, so every
//! operation rewrites the affected lists in one transaction.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::info;

use forum_db::Database;
use forum_types::api::{
    DeleteTagResponse, MergeTagsRequest, MergeTagsResponse, RenameTagRequest, RenameTagResponse,
    TagCount,
};

use crate::error::ApiError;
use crate::middleware::Staff;
use crate::posts::count_tags;
use crate::{AppState, run_blocking};

/// `old` replaced by `new`, keeping first occurrences only. `None` when
/// `old` is absent.
pub(crate) fn renamed(tags: &[String], old: &str, new: &str) -> Option<Vec<String>> {
    if !tags.iter().any(|t| t == old) {
        return None;
    }
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = if tag == old { new } else { tag.as_str() };
        if !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    Some(out)
}

/// `tag` removed. The inner `None` means the list became empty.
pub(crate) fn without(tags: &[String], tag: &str) -> Option<Option<Vec<String>>> {
    if !tags.iter().any(|t| t == tag) {
        return None;
    }
    let rest: Vec<String> = tags.iter().filter(|t| *t != tag).cloned().collect();
    Some(if rest.is_empty() { None } else { Some(rest) })
}

/// Sources removed and `target` appended once. `None` when no source is
/// present.
pub(crate) fn merged(tags: &[String], sources: &[String], target: &str) -> Option<Vec<String>> {
    if !tags.iter().any(|t| sources.contains(t)) {
        return None;
    }
    let mut out: Vec<String> = tags.iter().filter(|t| !sources.contains(t)).cloned().collect();
    if !out.iter().any(|t| t == target) {
        out.push(target.to_string());
    }
    Some(out)
}

/// Applies `edit` to every tagged post and stores the lists it changed.
fn rewrite<F>(db: &Database, mut edit: F) -> Result<usize, ApiError>
where
    F: FnMut(&[String]) -> Option<Option<Vec<String>>>,
{
    let updates: Vec<(String, Option<Vec<String>>)> = db
        .tagged_posts()?
        .into_iter()
        .filter_map(|(id, tags)| edit(&tags).map(|next| (id, next)))
        .collect();
    if updates.is_empty() {
        return Ok(0);
    }
    Ok(db.update_post_tags(&updates)?)
}

fn required(value: &str, message: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(message));
    }
    Ok(value.to_string())
}

#[derive(Debug, Deserialize)]
pub struct ListTagsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    1000
}

/// GET /admin/tags
pub async fn list_tags(
    State(state): State<AppState>,
    _staff: Staff,
    Query(query): Query<ListTagsQuery>,
) -> Result<Json<Vec<TagCount>>, ApiError> {
    let lists = run_blocking(&state, |db| {
        Ok(db.tagged_posts()?.into_iter().map(|(_, tags)| tags).collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(count_tags(lists, query.limit)))
}

/// PUT /admin/tags/rename
pub async fn rename_tag(
    State(state): State<AppState>,
    staff: Staff,
    Json(req): Json<RenameTagRequest>,
) -> Result<Json<RenameTagResponse>, ApiError> {
    let old_tag = required(&req.old_tag, "Old tag name is required")?;
    let new_tag = required(&req.new_tag, "New tag name is required")?;
    if old_tag == new_tag {
        return Err(ApiError::bad_request("Old and new tag names must be different"));
    }

    let (old, new) = (old_tag.clone(), new_tag.clone());
    let updated = run_blocking(&state, move |db| {
        let updated = rewrite(db, |tags| renamed(tags, &old, &new).map(Some))?;
        info!(old_tag = %old, new_tag = %new, updated, by = staff.id(), "Tag renamed");
        Ok(updated)
    })
    .await?;

    Ok(Json(RenameTagResponse {
        success: true,
        updated,
        old_tag,
        new_tag,
    }))
}

/// DELETE /admin/tags/{tag_name}
pub async fn delete_tag(
    State(state): State<AppState>,
    staff: Staff,
    Path(tag_name): Path<String>,
) -> Result<Json<DeleteTagResponse>, ApiError> {
    let tag = required(&tag_name, "Tag name is required")?;

    let target = tag.clone();
    let updated = run_blocking(&state, move |db| {
        let updated = rewrite(db, |tags| without(tags, &target))?;
        info!(tag = %target, updated, by = staff.id(), "Tag deleted");
        Ok(updated)
    })
    .await?;

    Ok(Json(DeleteTagResponse {
        success: true,
        updated,
        tag,
    }))
}

/// POST /admin/tags/merge
pub async fn merge_tags(
    State(state): State<AppState>,
    staff: Staff,
    Json(req): Json<MergeTagsRequest>,
) -> Result<Json<MergeTagsResponse>, ApiError> {
    if req.source_tags.is_empty() {
        return Err(ApiError::bad_request("Source tags are required"));
    }
    let target_tag = required(&req.target_tag, "Target tag name is required")?;
    let source_tags: Vec<String> = req
        .source_tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if source_tags.is_empty() {
        return Err(ApiError::bad_request("At least one valid source tag is required"));
    }

    let (sources, target) = (source_tags.clone(), target_tag.clone());
    let updated = run_blocking(&state, move |db| {
        let updated = rewrite(db, |tags| merged(tags, &sources, &target).map(Some))?;
        info!(target_tag = %target, updated, by = staff.id(), "Tags merged");
        Ok(updated)
    })
    .await?;

    Ok(Json(MergeTagsResponse {
        success: true,
        updated,
        source_tags,
        target_tag,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn rename_deduplicates() {
        assert_eq!(
            renamed(&tags(&["rust", "lang", "rs"]), "rs", "rust"),
            Some(tags(&["rust", "lang"]))
        );
        assert_eq!(renamed(&tags(&["lang"]), "rs", "rust"), None);
    }

    #[test]
    fn removing_last_tag_empties_list() {
        assert_eq!(without(&tags(&["a", "b"]), "a"), Some(Some(tags(&["b"]))));
        assert_eq!(without(&tags(&["a"]), "a"), Some(None));
        assert_eq!(without(&tags(&["b"]), "a"), None);
    }

    #[test]
    fn merge_appends_target_once() {
        let sources = tags(&["js", "javascript"]);
        assert_eq!(
            merged(&tags(&["js", "web", "javascript"]), &sources, "JavaScript"),
            Some(tags(&["web", "JavaScript"]))
        );
        assert_eq!(
            merged(&tags(&["JavaScript", "js"]), &sources, "JavaScript"),
            Some(tags(&["JavaScript"]))
        );
        assert_eq!(merged(&tags(&["web"]), &sources, "JavaScript"), None);
    }
}
