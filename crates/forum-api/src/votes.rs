use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use forum_db::models::VoteOutcome;
use forum_db::new_id;
use forum_types::api::{ReportRequest, VoteRequest, VoteResponse};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::points::{POST_UPVOTED_REWARD, REPLY_UPVOTED_REWARD, reward};
use crate::validate::{non_blank, optional_max_len, require_len};
use crate::{AppState, run_blocking, views};

fn vote_response(outcome: VoteOutcome) -> VoteResponse {
    VoteResponse {
        upvote_count: outcome.upvote_count,
        downvote_count: outcome.downvote_count,
        user_vote: outcome.current,
    }
}

/// POST /posts/{post_id}/vote
pub async fn vote_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let outcome = run_blocking(&state, move |db| {
        let post = db
            .get_post(&post_id)?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;
        let outcome = db.vote_post(&post_id, &user.id, req.vote_type)?;
        if outcome.fresh_upvote && post.author_id != user.id {
            reward(db, &post.author_id, POST_UPVOTED_REWARD, "post upvoted");
        }
        Ok(outcome)
    })
    .await?;

    debug!(up = outcome.upvote_count, down = outcome.downvote_count, "Post vote recorded");
    Ok(Json(vote_response(outcome)))
}

/// POST /posts/{post_id}/replies/{reply_id}/vote
pub async fn vote_reply(
    State(state): State<AppState>,
    user: AuthUser,
    Path((post_id, reply_id)): Path<(String, String)>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let outcome = run_blocking(&state, move |db| {
        let reply = db
            .get_reply(&reply_id)?
            .ok_or_else(|| ApiError::not_found("Reply not found"))?;
        if reply.post_id != post_id {
            return Err(ApiError::bad_request("Reply does not belong to this post"));
        }
        let outcome = db.vote_reply(&reply_id, &user.id, req.vote_type)?;
        if outcome.fresh_upvote && reply.author_id != user.id {
            reward(db, &reply.author_id, REPLY_UPVOTED_REWARD, "reply upvoted");
        }
        Ok(outcome)
    })
    .await?;

    Ok(Json(vote_response(outcome)))
}

fn validate_report(req: &ReportRequest) -> Result<(String, Option<String>), ApiError> {
    let reason = req.reason.trim().to_string();
    require_len("reason", &reason, 1, 200)?;
    let description = non_blank(req.description.clone());
    optional_max_len("description", description.as_deref(), 1000)?;
    Ok((reason, description))
}

/// POST /posts/{post_id}/report
pub async fn report_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<String>,
    Json(req): Json<ReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (reason, description) = validate_report(&req)?;

    let report = run_blocking(&state, move |db| {
        if db.get_post(&post_id)?.is_none() {
            return Err(ApiError::not_found("Post not found"));
        }
        db.create_report(&new_id(), &post_id, None, &user.id, &reason, description.as_deref())?
            .ok_or_else(|| ApiError::bad_request("You have already reported this post"))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(views::report(report))))
}

/// POST /posts/{post_id}/replies/{reply_id}/report
pub async fn report_reply(
    State(state): State<AppState>,
    user: AuthUser,
    Path((post_id, reply_id)): Path<(String, String)>,
    Json(req): Json<ReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (reason, description) = validate_report(&req)?;

    let report = run_blocking(&state, move |db| {
        let reply = db
            .get_reply(&reply_id)?
            .ok_or_else(|| ApiError::not_found("Reply not found"))?;
        if reply.post_id != post_id {
            return Err(ApiError::bad_request("Reply does not belong to this post"));
        }
        db.create_report(
            &new_id(),
            &post_id,
            Some(&reply_id),
            &user.id,
            &reason,
            description.as_deref(),
        )?
        .ok_or_else(|| ApiError::bad_request("You have already reported this reply"))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(views::report(report))))
}
