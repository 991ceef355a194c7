use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::warn;

use forum_db::timestamp;
use forum_types::api::{CommunityStats, UserProfile};

use crate::error::ApiError;
use crate::{AppState, run_blocking, views};

const ACTIVE_WINDOW_DAYS: i64 = 30;
const THREAD_WINDOW_DAYS: i64 = 7;

/// GET /stats/community. Public; a store failure degrades to zeros.
pub async fn community(State(state): State<AppState>) -> Json<CommunityStats> {
    let now = Utc::now();
    let active_since = timestamp(now - Duration::days(ACTIVE_WINDOW_DAYS));
    let week_ago = timestamp(now - Duration::days(THREAD_WINDOW_DAYS));
    let until = timestamp(now + Duration::seconds(1));

    let result = run_blocking(&state, move |db| {
        Ok(CommunityStats {
            active_members: db.active_members_since(&active_since)?,
            threads_this_week: db.count_posts_between(&week_ago, &until)?,
        })
    })
    .await;

    match result {
        Ok(stats) => Json(stats),
        Err(e) => {
            warn!("Community stats unavailable: {}", e);
            Json(CommunityStats {
                active_members: 0,
                threads_this_week: 0,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TopUsersQuery {
    #[serde(default = "default_top_limit")]
    pub limit: i64,
}

fn default_top_limit() -> i64 {
    5
}

/// GET /stats/top-users. Staff accounts are left out and emails are hidden.
pub async fn top_users(
    State(state): State<AppState>,
    Query(query): Query<TopUsersQuery>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let limit = query.limit.clamp(1, 100);
    let rows = run_blocking(&state, move |db| Ok(db.top_users(limit)?)).await?;
    Ok(Json(rows.into_iter().map(|r| views::profile(r, false)).collect()))
}
