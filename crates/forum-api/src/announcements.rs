use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use forum_db::models::{AnnouncementChanges, AnnouncementRow};
use forum_db::{Database, new_id};
use forum_types::api::{AnnouncementResponse, CreateAnnouncementRequest, UpdateAnnouncementRequest};

use crate::error::ApiError;
use crate::middleware::Staff;
use crate::validate::require_len;
use crate::{AppState, run_blocking, views};

const MAX_PRIORITY: i64 = 10;

fn check_priority(priority: i64) -> Result<(), ApiError> {
    if !(0..=MAX_PRIORITY).contains(&priority) {
        return Err(ApiError::validation(format!(
            "priority must be between 0 and {}",
            MAX_PRIORITY
        )));
    }
    Ok(())
}

fn with_author(db: &Database, row: AnnouncementRow) -> Result<AnnouncementResponse, ApiError> {
    let by = db.author_by_id(&row.created_by)?;
    Ok(views::announcement(row, by))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_true")]
    pub active_only: bool,
}

fn default_true() -> bool {
    true
}

/// GET /announcements
pub async fn list_announcements(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<AnnouncementResponse>>, ApiError> {
    let items = run_blocking(&state, move |db| {
        db.list_announcements(query.active_only)?
            .into_iter()
            .map(|row| with_author(db, row))
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;
    Ok(Json(items))
}

/// GET /announcements/{announcement_id}
pub async fn get_announcement(
    State(state): State<AppState>,
    Path(announcement_id): Path<String>,
) -> Result<Json<AnnouncementResponse>, ApiError> {
    let item = run_blocking(&state, move |db| {
        let row = db
            .get_announcement(&announcement_id)?
            .ok_or_else(|| ApiError::not_found("Announcement not found"))?;
        with_author(db, row)
    })
    .await?;
    Ok(Json(item))
}

/// POST /announcements
pub async fn create_announcement(
    State(state): State<AppState>,
    staff: Staff,
    Json(req): Json<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    require_len("title", &title, 1, 200)?;
    require_len("content", req.content.trim(), 1, 2000)?;
    check_priority(req.priority)?;

    let item = run_blocking(&state, move |db| {
        let row = db.create_announcement(
            &new_id(),
            &title,
            &req.content,
            staff.id(),
            req.priority,
            req.is_active,
        )?;
        info!(announcement_id = %row.id, created_by = staff.id(), "Announcement created");
        with_author(db, row)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /announcements/{announcement_id}
pub async fn update_announcement(
    State(state): State<AppState>,
    _staff: Staff,
    Path(announcement_id): Path<String>,
    Json(req): Json<UpdateAnnouncementRequest>,
) -> Result<Json<AnnouncementResponse>, ApiError> {
    if req.title.is_none() && req.content.is_none() && req.priority.is_none() && req.is_active.is_none() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    let title = match req.title {
        Some(title) => {
            let title = title.trim().to_string();
            require_len("title", &title, 1, 200)?;
            Some(title)
        }
        None => None,
    };
    if let Some(content) = req.content.as_deref() {
        require_len("content", content.trim(), 1, 2000)?;
    }
    if let Some(priority) = req.priority {
        check_priority(priority)?;
    }

    let changes = AnnouncementChanges {
        title,
        content: req.content,
        priority: req.priority,
        is_active: req.is_active,
    };
    let item = run_blocking(&state, move |db| {
        let row = db
            .update_announcement(&announcement_id, &changes)?
            .ok_or_else(|| ApiError::not_found("Announcement not found"))?;
        with_author(db, row)
    })
    .await?;
    Ok(Json(item))
}

/// DELETE /announcements/{announcement_id}
pub async fn delete_announcement(
    State(state): State<AppState>,
    _staff: Staff,
    Path(announcement_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    run_blocking(&state, move |db| {
        if !db.delete_announcement(&announcement_id)? {
            return Err(ApiError::not_found("Announcement not found"));
        }
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
