use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;

use forum_db::Database;
use forum_types::api::{PointRecord, RankingResponse, UpdateProfileRequest, UserProfile};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::validate::{char_len, require_len};
use crate::{AppState, run_blocking, views};

// -- Rewards and costs --

pub const DAILY_LOGIN_BONUS: i64 = 1;
pub const CREATE_POST_REWARD: i64 = 10;
pub const CREATE_REPLY_REWARD: i64 = 5;
pub const POST_UPVOTED_REWARD: i64 = 2;
pub const REPLY_UPVOTED_REWARD: i64 = 1;
pub const CREATE_GROUP_REWARD: i64 = 20;
pub const PIN_POST_COST: i64 = 50;
pub const PRIVATE_GROUP_COST: i64 = 30;

const MAX_AVATAR_URL_LEN: usize = 100_000;

/// Pays a reward as a side effect. Failures are logged, never surfaced.
pub(crate) fn reward(db: &Database, user_id: &str, points: i64, reason: &str) {
    if let Err(e) = db.award_points(user_id, points, reason) {
        warn!(user_id, points, reason, "Failed to award points: {:#}", e);
    }
}

/// GET /points/profile
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = run_blocking(&state, move |db| {
        db.get_user_by_id(&user.id)?
            .ok_or_else(|| ApiError::not_found("User profile not found"))
    })
    .await?;
    Ok(Json(views::profile(profile, true)))
}

/// PATCH /points/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    if req.username.is_none() && req.avatar_url.is_none() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let username = match req.username {
        Some(name) => {
            let name = name.trim().to_string();
            require_len("username", &name, 1, 50)?;
            Some(name)
        }
        None => None,
    };
    let avatar_url = match req.avatar_url {
        Some(url) => {
            if char_len(&url) > MAX_AVATAR_URL_LEN {
                return Err(ApiError::validation(format!(
                    "avatar_url must be at most {} characters",
                    MAX_AVATAR_URL_LEN
                )));
            }
            let url = url.trim().to_string();
            Some(if url.is_empty() { None } else { Some(url) })
        }
        None => None,
    };

    let updated = run_blocking(&state, move |db| {
        db.update_profile(
            &user.id,
            username.as_deref(),
            avatar_url.as_ref().map(|url| url.as_deref()),
        )?
        .ok_or_else(|| ApiError::not_found("User profile not found"))
    })
    .await?;
    Ok(Json(views::profile(updated, true)))
}

/// GET /points/ranking
pub async fn ranking(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let (ranking, total_users, total_points) =
        run_blocking(&state, move |db| Ok(db.ranking(&user.id)?)).await?;
    Ok(Json(RankingResponse {
        ranking,
        total_users,
        total_points,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    50
}

/// GET /points/history
pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.clamp(1, 500);
    let rows = run_blocking(&state, move |db| Ok(db.point_history(&user.id, limit)?)).await?;
    let records: Vec<PointRecord> = rows
        .into_iter()
        .map(|r| PointRecord {
            id: r.id,
            user_id: r.user_id,
            points: r.points,
            reason: r.reason,
            created_at: r.created_at,
        })
        .collect();
    Ok(Json(records))
}
