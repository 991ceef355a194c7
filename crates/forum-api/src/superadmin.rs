use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::info;

use forum_types::api::{
    DeleteUserResponse, RoleUpdateRequest, RoleUpdateResponse, SuperadminStats, SystemLogEntry,
    SystemLogsResponse, UserProfile,
};
use forum_types::models::Role;

use crate::error::ApiError;
use crate::middleware::Superadmin;
use crate::validate::non_blank;
use crate::{AppState, run_blocking, views};

/// GET /superadmin/stats
pub async fn stats(
    State(state): State<AppState>,
    _caller: Superadmin,
) -> Result<Json<SuperadminStats>, ApiError> {
    let (totals, roles) = run_blocking(&state, |db| Ok((db.site_totals()?, db.role_distribution()?))).await?;
    Ok(Json(SuperadminStats {
        total_users: totals.users,
        total_posts: totals.posts,
        total_replies: totals.replies,
        total_groups: totals.groups,
        total_applications: totals.group_applications,
        total_reports: totals.group_reports,
        role_distribution: roles.into_iter().collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub role_filter: Option<String>,
}

fn default_limit() -> i64 {
    100
}

/// GET /superadmin/users
pub async fn list_users(
    State(state): State<AppState>,
    _caller: Superadmin,
    Query(query): Query<UsersQuery>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let limit = query.limit.clamp(1, 1000);
    let offset = query.offset.max(0);
    let role = non_blank(query.role_filter);

    let rows = run_blocking(&state, move |db| {
        Ok(db.list_users_by_role(limit, offset, role.as_deref())?)
    })
    .await?;
    Ok(Json(rows.into_iter().map(|r| views::profile(r, true)).collect()))
}

/// PATCH /superadmin/users/{user_id}/role
pub async fn update_role(
    State(state): State<AppState>,
    Superadmin(caller): Superadmin,
    Path(user_id): Path<String>,
    Json(req): Json<RoleUpdateRequest>,
) -> Result<Json<RoleUpdateResponse>, ApiError> {
    let role: Role = req
        .new_role
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid role"))?;

    let target = user_id.clone();
    run_blocking(&state, move |db| {
        if !db.set_user_role(&target, role.as_str())? {
            return Err(ApiError::not_found("User not found"));
        }
        info!(user_id = %target, role = role.as_str(), by = %caller.id, "Role changed");
        Ok(())
    })
    .await?;

    Ok(Json(RoleUpdateResponse {
        success: true,
        user_id,
        role,
    }))
}

/// DELETE /superadmin/users/{user_id}
pub async fn delete_user(
    State(state): State<AppState>,
    Superadmin(caller): Superadmin,
    Path(user_id): Path<String>,
) -> Result<Json<DeleteUserResponse>, ApiError> {
    if user_id == caller.id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    let target = user_id.clone();
    run_blocking(&state, move |db| {
        if db.delete_user(&target)? {
            info!(user_id = %target, by = %caller.id, "User deleted by superadmin");
        }
        Ok(())
    })
    .await?;

    Ok(Json(DeleteUserResponse {
        success: true,
        user_id,
        message: "User deleted successfully".into(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// GET /superadmin/system/logs. Backed by the points ledger, which records
/// every reward and charge.
pub async fn system_logs(
    State(state): State<AppState>,
    _caller: Superadmin,
    Query(query): Query<LogsQuery>,
) -> Result<Json<SystemLogsResponse>, ApiError> {
    let limit = query.limit.clamp(1, 1000);
    let rows = run_blocking(&state, move |db| Ok(db.recent_point_records(limit)?)).await?;

    let logs: Vec<SystemLogEntry> = rows
        .into_iter()
        .map(|r| SystemLogEntry {
            id: r.id,
            user_id: r.user_id,
            username: r.username,
            points: r.points,
            reason: r.reason,
            created_at: r.created_at,
        })
        .collect();

    Ok(Json(SystemLogsResponse {
        message: format!("{} most recent point events", logs.len()),
        logs,
    }))
}
