use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use forum_db::models::{NewPost, PinOutcome, PostSort};
use forum_db::{Database, new_id, timestamp};
use forum_types::api::{
    CreatePostRequest, CreateReplyRequest, Paginated, PostDetail, PostResponse, ReplyResponse,
    SimilarPost, TagCount,
};

use crate::error::ApiError;
use crate::middleware::{AuthUser, MaybeUser};
use crate::points::{CREATE_POST_REWARD, CREATE_REPLY_REWARD, PIN_POST_COST, reward};
use crate::validate::{PageQuery, clean_tags, non_blank, optional_max_len, page_offset, require_len};
use crate::{AppState, run_blocking, views};

/// How long a paid pin keeps a post on top.
pub const PIN_DURATION_DAYS: i64 = 7;

const MAX_PAGE_SIZE: i64 = 10_000;
const HOT_TAG_WINDOW: i64 = 500;

/// Pins placed before this instant have expired.
fn pin_cutoff() -> String {
    timestamp(Utc::now() - Duration::days(PIN_DURATION_DAYS))
}

pub(crate) fn parse_sort(raw: Option<&str>) -> PostSort {
    match raw {
        Some("views") => PostSort::Views,
        Some("replies") => PostSort::Replies,
        _ => PostSort::Latest,
    }
}

/// Usage counts, most used first, ties broken alphabetically.
pub(crate) fn count_tags<I>(lists: I, limit: usize) -> Vec<TagCount>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut counts: HashMap<String, i64> = HashMap::new();
    for tags in lists {
        for tag in tags {
            *counts.entry(tag).or_default() += 1;
        }
    }
    let mut out: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    out.truncate(limit);
    out
}

/// Nests replies under their parents. Siblings keep creation order; a reply
/// whose parent is missing becomes top-level.
pub(crate) fn build_reply_tree(mut replies: Vec<ReplyResponse>) -> Vec<ReplyResponse> {
    replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    let ids: HashSet<String> = replies.iter().map(|r| r.id.clone()).collect();

    let mut children: HashMap<String, Vec<ReplyResponse>> = HashMap::new();
    let mut roots = Vec::new();
    for reply in replies {
        match reply.parent_reply_id.clone() {
            Some(parent) if parent != reply.id && ids.contains(&parent) => {
                children.entry(parent).or_default().push(reply);
            }
            _ => roots.push(reply),
        }
    }

    fn attach(node: &mut ReplyResponse, children: &mut HashMap<String, Vec<ReplyResponse>>) {
        if let Some(mut kids) = children.remove(&node.id) {
            for kid in &mut kids {
                attach(kid, children);
            }
            node.replies = kids;
        }
    }

    for root in &mut roots {
        attach(root, &mut children);
    }
    roots
}

/// Converts post rows, attaching the viewer's vote when there is one.
fn with_votes(
    db: &Database,
    viewer: Option<&str>,
    rows: Vec<forum_db::models::PostRow>,
) -> Result<Vec<PostResponse>, ApiError> {
    let votes = match viewer {
        Some(user_id) => {
            let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
            db.post_votes_by_user(user_id, &ids)?
        }
        None => HashMap::new(),
    };
    Ok(rows
        .into_iter()
        .map(|row| {
            let vote = votes.get(&row.id).copied();
            views::post(row, vote)
        })
        .collect())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_by: Option<String>,
}

/// GET /posts
pub async fn list_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<PostResponse>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = match query.page_size {
        Some(size) if size < 1 => 10,
        Some(size) => size.min(MAX_PAGE_SIZE),
        None => 10,
    };
    let sort = parse_sort(query.sort_by.as_deref());
    let viewer = viewer.id();

    let result = run_blocking(&state, move |db| {
        db.clear_expired_pins(&pin_cutoff())?;
        let (rows, total) = db.list_posts(sort, page_size, page_offset(page, page_size))?;
        let items = with_votes(db, viewer.as_deref(), rows)?;
        Ok(Paginated::new(items, total, page, page_size))
    })
    .await?;
    Ok(Json(result))
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::validation("Title cannot be empty"));
    }
    require_len("title", &title, 3, 200)?;
    let category = non_blank(req.category);
    let summary = non_blank(req.summary);
    optional_max_len("category", category.as_deref(), 80)?;
    optional_max_len("summary", summary.as_deref(), 500)?;
    let tags = clean_tags(req.tags)?;
    let cover_image_url = non_blank(req.cover_image_url);

    let post = run_blocking(&state, move |db| {
        let row = db.create_post(
            &new_id(),
            &user.id,
            &NewPost {
                title: &title,
                category: category.as_deref(),
                summary: summary.as_deref(),
                cover_image_url: cover_image_url.as_deref(),
                tags: tags.as_deref(),
            },
        )?;
        reward(db, &user.id, CREATE_POST_REWARD, "create post");
        Ok(views::post(row, None))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /posts/{post_id}. Counts a view and returns the reply tree.
pub async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(post_id): Path<String>,
) -> Result<Json<PostDetail>, ApiError> {
    let viewer = viewer.id();

    let detail = run_blocking(&state, move |db| {
        db.clear_expired_pins(&pin_cutoff())?;
        if db.get_post(&post_id)?.is_none() {
            return Err(ApiError::not_found("Post not found"));
        }
        db.increment_view_count(&post_id)?;
        let row = db
            .get_post(&post_id)?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;

        let (post_vote, reply_votes) = match viewer.as_deref() {
            Some(user_id) => (
                db.post_votes_by_user(user_id, std::slice::from_ref(&post_id))?
                    .remove(&post_id),
                db.reply_votes_by_user(user_id, &post_id)?,
            ),
            None => (None, HashMap::new()),
        };

        let replies = db
            .replies_for_post(&post_id)?
            .into_iter()
            .map(|r| {
                let vote = reply_votes.get(&r.id).copied();
                views::reply(r, vote)
            })
            .collect();

        Ok(PostDetail {
            post: views::post(row, post_vote),
            replies: build_reply_tree(replies),
        })
    })
    .await?;
    Ok(Json(detail))
}

/// POST /posts/{post_id}/replies
pub async fn create_reply(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<String>,
    Json(req): Json<CreateReplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    require_len("content", &content, 1, 4000)?;
    let parent_reply_id = non_blank(req.parent_reply_id);

    let reply = run_blocking(&state, move |db| {
        let post = db
            .get_post(&post_id)?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;
        if post.is_closed {
            return Err(ApiError::forbidden("Post is closed"));
        }
        if let Some(parent_id) = parent_reply_id.as_deref() {
            let parent = db
                .get_reply(parent_id)?
                .ok_or_else(|| ApiError::not_found("Parent reply not found"))?;
            if parent.post_id != post_id {
                return Err(ApiError::bad_request("Parent reply does not belong to this post"));
            }
        }

        let row = db.create_reply(&new_id(), &post_id, parent_reply_id.as_deref(), &user.id, &content)?;
        reward(db, &user.id, CREATE_REPLY_REWARD, "create reply");
        Ok(views::reply(row, None))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(reply)))
}

/// PATCH /posts/{post_id}/close
pub async fn close_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = run_blocking(&state, move |db| {
        let post = db
            .get_post(&post_id)?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;
        if post.author_id != user.id {
            return Err(ApiError::forbidden("Only post owner can close it"));
        }
        db.close_post(&post_id)?;
        let row = db
            .get_post(&post_id)?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;
        Ok(views::post(row, None))
    })
    .await?;
    Ok(Json(post))
}

/// POST /posts/{post_id}/pin
pub async fn pin_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = run_blocking(&state, move |db| {
        match db.pin_post(&post_id, &user.id, PIN_POST_COST, &pin_cutoff())? {
            PinOutcome::Pinned => {}
            PinOutcome::NotFound => return Err(ApiError::not_found("Post not found")),
            PinOutcome::AlreadyPinned => {
                return Err(ApiError::bad_request("Post is already pinned and not expired"));
            }
            PinOutcome::NotOwner => return Err(ApiError::forbidden("Only post owner can pin it")),
            PinOutcome::Insufficient { current } => {
                return Err(ApiError::bad_request(format!(
                    "Insufficient points to pin post. Required: {}, Current: {}",
                    PIN_POST_COST, current
                )));
            }
        }
        let row = db
            .get_post(&post_id)?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;
        Ok(views::post(row, None))
    })
    .await?;
    Ok(Json(post))
}

#[derive(Debug, Deserialize)]
pub struct HotTagsQuery {
    #[serde(default = "default_hot_tag_limit")]
    pub limit: usize,
}

fn default_hot_tag_limit() -> usize {
    20
}

/// GET /posts/hot-tags
pub async fn hot_tags(
    State(state): State<AppState>,
    Query(query): Query<HotTagsQuery>,
) -> Result<Json<Vec<TagCount>>, ApiError> {
    let lists = run_blocking(&state, |db| Ok(db.recent_post_tags(HOT_TAG_WINDOW)?)).await?;
    Ok(Json(count_tags(lists, query.limit)))
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_similar_limit")]
    pub limit: i64,
}

fn default_similar_limit() -> i64 {
    5
}

/// GET /posts/similar
pub async fn similar_posts(
    State(state): State<AppState>,
    Query(query): Query<SimilarQuery>,
) -> Result<Json<Vec<SimilarPost>>, ApiError> {
    let needle = query.title.trim().to_string();
    if needle.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let limit = query.limit.clamp(1, 50);
    let rows = run_blocking(&state, move |db| Ok(db.similar_posts(&needle, limit)?)).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(id, title, reply_count)| SimilarPost {
                id,
                title,
                reply_count,
            })
            .collect(),
    ))
}

/// GET /posts/my-posts
pub async fn my_posts(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<PostResponse>>, ApiError> {
    let page = query.page();
    let page_size = query.size_or_default(10, 100);
    let offset = query.offset(page_size);

    let result = run_blocking(&state, move |db| {
        db.clear_expired_pins(&pin_cutoff())?;
        let (rows, total) = db.list_posts_by_author(&user.id, page_size, offset)?;
        let items = with_votes(db, Some(&user.id), rows)?;
        Ok(Paginated::new(items, total, page, page_size))
    })
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// GET /posts/my-posts/replies. Replies left on the caller's posts.
pub async fn replies_to_my_posts(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ReplyResponse>>, ApiError> {
    let limit = match query.limit {
        Some(limit) if (1..=200).contains(&limit) => limit,
        _ => 50,
    };
    let rows = run_blocking(&state, move |db| Ok(db.replies_to_author(&user.id, limit)?)).await?;
    Ok(Json(rows.into_iter().map(|r| views::reply(r, None)).collect()))
}

/// GET /posts/my-posts/{post_id}/replies
pub async fn my_post_replies(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ReplyResponse>>, ApiError> {
    let page_size = query.size_or_default(20, 100);
    let offset = query.offset(page_size);

    let rows = run_blocking(&state, move |db| {
        match db.get_post(&post_id)? {
            Some(post) if post.author_id == user.id => {}
            _ => {
                return Err(ApiError::not_found(
                    "Post not found or you don't have permission",
                ));
            }
        }
        Ok(db.replies_for_post_page(&post_id, page_size, offset)?)
    })
    .await?;
    Ok(Json(rows.into_iter().map(|r| views::reply(r, None)).collect()))
}
