use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use forum_db::models::UserChanges;
use forum_db::timestamp;
use forum_types::api::{
    AdminCreateUserRequest, AdminStats, AdminUpdateUserRequest, ClosePostResponse,
    GroupApplicationResponse, Paginated, UserProfile, WeeklyBucket, WeeklyStats,
};

use crate::auth::{hash_password, validate_credentials};
use crate::error::ApiError;
use crate::line::with_groups;
use crate::middleware::Staff;
use crate::validate::{PageQuery, non_blank, require_len};
use crate::{AppState, run_blocking, views};

const MAX_WEEKS: i64 = 52;

/// `(start, end)` of each of the last `weeks` seven-day windows ending at
/// `now`, oldest first.
pub(crate) fn week_windows(now: DateTime<Utc>, weeks: i64) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    (0..weeks)
        .rev()
        .map(|offset| {
            let end = now - Duration::weeks(offset);
            (end - Duration::days(7), end)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default = "default_user_limit")]
    pub limit: i64,
    #[serde(default = "default_true")]
    pub exclude_admins: bool,
}

fn default_user_limit() -> i64 {
    100
}

fn default_true() -> bool {
    true
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    _staff: Staff,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let limit = query.limit.clamp(1, 1000);
    let rows = run_blocking(&state, move |db| Ok(db.list_users(limit, query.exclude_admins)?)).await?;
    Ok(Json(rows.into_iter().map(|r| views::profile(r, true)).collect()))
}

/// POST /admin/users
pub async fn create_user(
    State(state): State<AppState>,
    staff: Staff,
    Json(req): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    let username = req.username.trim().to_string();
    validate_credentials(&email, &username, &req.password)?;
    let password_hash = hash_password(&req.password)?;

    let row = run_blocking(&state, move |db| {
        if db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        let row = db.create_user(&Uuid::new_v4().to_string(), &email, &username, &password_hash)?;
        info!(user_id = %row.id, created_by = staff.id(), "User created by staff");
        Ok(row)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(views::profile(row, true))))
}

/// PATCH /admin/users/{user_id}
pub async fn update_user(
    State(state): State<AppState>,
    staff: Staff,
    Path(user_id): Path<String>,
    Json(req): Json<AdminUpdateUserRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let username = match non_blank(req.username) {
        Some(name) => {
            require_len("username", &name, 1, 50)?;
            Some(name)
        }
        None => None,
    };
    let email = non_blank(req.email);
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(ApiError::validation("A valid email address is required"));
    }
    let password_hash = match req.password.as_deref() {
        Some(password) if password.len() < 6 || password.len() > 72 => {
            return Err(ApiError::validation("password must be between 6 and 72 bytes"));
        }
        Some(password) => Some(hash_password(password)?),
        None => None,
    };
    if req.total_points.is_some_and(|p| p < 0) {
        return Err(ApiError::validation("total_points cannot be negative"));
    }

    let changes = UserChanges {
        username,
        email,
        password_hash,
        total_points: req.total_points,
    };
    if changes.username.is_none()
        && changes.email.is_none()
        && changes.password_hash.is_none()
        && changes.total_points.is_none()
    {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let row = run_blocking(&state, move |db| {
        if let Some(email) = changes.email.as_deref() {
            if let Some(other) = db.get_user_by_email(email)? {
                if other.id != user_id {
                    return Err(ApiError::Conflict("Email already registered".into()));
                }
            }
        }
        let row = db
            .update_user(&user_id, &changes)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        info!(user_id = %user_id, updated_by = staff.id(), "User updated by staff");
        Ok(row)
    })
    .await?;
    Ok(Json(views::profile(row, true)))
}

/// DELETE /admin/users/{user_id}. Succeeds whether or not the user existed.
pub async fn delete_user(
    State(state): State<AppState>,
    staff: Staff,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    run_blocking(&state, move |db| {
        if db.delete_user(&user_id)? {
            info!(user_id = %user_id, deleted_by = staff.id(), "User deleted by staff");
        }
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /admin/posts/{post_id}/close
pub async fn close_post(
    State(state): State<AppState>,
    staff: Staff,
    Path(post_id): Path<String>,
) -> Result<Json<ClosePostResponse>, ApiError> {
    let closed_id = post_id.clone();
    run_blocking(&state, move |db| {
        if !db.close_post(&post_id)? {
            return Err(ApiError::not_found("Post not found"));
        }
        info!(post_id = %post_id, closed_by = staff.id(), "Post closed by staff");
        Ok(())
    })
    .await?;
    Ok(Json(ClosePostResponse {
        success: true,
        post_id: closed_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ApplicationsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status_filter: Option<String>,
}

/// GET /admin/applications
pub async fn list_applications(
    State(state): State<AppState>,
    _staff: Staff,
    Query(query): Query<ApplicationsQuery>,
) -> Result<Json<Paginated<GroupApplicationResponse>>, ApiError> {
    let paging = PageQuery {
        page: query.page,
        page_size: query.page_size,
    };
    let page = paging.page();
    let page_size = paging.size_or_default(10, 100);
    let offset = paging.offset(page_size);
    let status = non_blank(query.status_filter);

    let result = run_blocking(&state, move |db| {
        let (rows, total) = db.list_group_applications(status.as_deref(), page_size, offset)?;
        let items = with_groups(db, rows)?;
        Ok(Paginated::new(items, total, page, page_size))
    })
    .await?;
    Ok(Json(result))
}

/// GET /admin/stats. Threads are posts; "posts" counts replies.
pub async fn stats(
    State(state): State<AppState>,
    _staff: Staff,
) -> Result<Json<AdminStats>, ApiError> {
    let totals = run_blocking(&state, |db| Ok(db.site_totals()?)).await?;
    Ok(Json(AdminStats {
        total_users: totals.users,
        total_threads: totals.posts,
        total_posts: totals.replies,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WeeklyQuery {
    #[serde(default = "default_weeks")]
    pub weeks: i64,
}

fn default_weeks() -> i64 {
    8
}

/// GET /admin/stats/weekly
pub async fn weekly_stats(
    State(state): State<AppState>,
    _staff: Staff,
    Query(query): Query<WeeklyQuery>,
) -> Result<Json<WeeklyStats>, ApiError> {
    let weeks = query.weeks.clamp(1, MAX_WEEKS);
    let windows = week_windows(Utc::now(), weeks);

    let weekly_data = run_blocking(&state, move |db| {
        let mut buckets = Vec::with_capacity(windows.len());
        for (i, (start, end)) in windows.into_iter().enumerate() {
            let (start, end) = (timestamp(start), timestamp(end));
            buckets.push(WeeklyBucket {
                week: format!("Week {}", i + 1),
                new_users: db.count_users_between(&start, &end)?,
                new_posts: db.count_posts_between(&start, &end)?,
                week_start: start,
                week_end: end,
            });
        }
        Ok(buckets)
    })
    .await?;

    Ok(Json(WeeklyStats { weeks, weekly_data }))
}
