pub mod admin;
pub mod admin_auth;
pub mod announcements;
pub mod auth;
pub mod error;
pub mod line;
pub mod middleware;
pub mod points;
pub mod posts;
pub mod stats;
pub mod superadmin;
pub mod tags;
pub mod uploads;
pub mod votes;

mod validate;
mod views;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
};
use tracing::error;

use forum_db::Database;
use forum_types::api::HealthResponse;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub upload_dir: PathBuf,
    /// Lets `/admin-auth/register` create accounts after the first one.
    pub allow_admin_registration: bool,
}

/// Runs blocking database work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

/// Every route of the API. Transport layers (CORS, tracing) are added by the
/// server binary.
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/admin-auth/register", post(admin_auth::register))
        .route("/admin-auth/login", post(admin_auth::login));

    let post_routes = Router::new()
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/hot-tags", get(posts::hot_tags))
        .route("/posts/similar", get(posts::similar_posts))
        .route("/posts/my-posts", get(posts::my_posts))
        .route("/posts/my-posts/replies", get(posts::replies_to_my_posts))
        .route("/posts/my-posts/{post_id}/replies", get(posts::my_post_replies))
        .route("/posts/{post_id}", get(posts::get_post))
        .route("/posts/{post_id}/replies", post(posts::create_reply))
        .route("/posts/{post_id}/close", patch(posts::close_post))
        .route("/posts/{post_id}/pin", post(posts::pin_post))
        .route("/posts/{post_id}/vote", post(votes::vote_post))
        .route("/posts/{post_id}/report", post(votes::report_post))
        .route("/posts/{post_id}/replies/{reply_id}/vote", post(votes::vote_reply))
        .route("/posts/{post_id}/replies/{reply_id}/report", post(votes::report_reply));

    let points_routes = Router::new()
        .route("/points/profile", get(points::get_profile).patch(points::update_profile))
        .route("/points/ranking", get(points::ranking))
        .route("/points/history", get(points::history));

    let line_routes = Router::new()
        .route("/line-applications", post(line::create_line_application))
        .route("/line-groups", get(line::list_groups).post(line::create_group))
        .route("/line-groups/reports", get(line::list_group_reports))
        .route("/line-groups/reports/{report_id}/review", patch(line::review_group_report))
        .route(
            "/line-groups/creation-requests",
            get(line::list_creation_requests).post(line::create_creation_request),
        )
        .route(
            "/line-groups/creation-requests/{request_id}/review",
            patch(line::review_creation_request),
        )
        .route("/line-groups/my-applications", get(line::my_applications))
        .route(
            "/line-groups/my-managed-groups/applications",
            get(line::managed_group_applications),
        )
        .route(
            "/line-groups/applications/{application_id}/review",
            patch(line::review_application),
        )
        .route(
            "/line-groups/{group_id}",
            get(line::get_group).patch(line::update_group).delete(line::delete_group),
        )
        .route("/line-groups/{group_id}/apply", post(line::apply_to_group))
        .route("/line-groups/{group_id}/applications", get(line::group_applications))
        .route("/line-groups/{group_id}/report", post(line::report_group));

    let announcement_routes = Router::new()
        .route(
            "/announcements",
            get(announcements::list_announcements).post(announcements::create_announcement),
        )
        .route(
            "/announcements/{announcement_id}",
            get(announcements::get_announcement)
                .patch(announcements::update_announcement)
                .delete(announcements::delete_announcement),
        );

    let stats_routes = Router::new()
        .route("/stats/community", get(stats::community))
        .route("/stats/top-users", get(stats::top_users));

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/users/{user_id}", patch(admin::update_user).delete(admin::delete_user))
        .route("/admin/posts/{post_id}/close", patch(admin::close_post))
        .route("/admin/applications", get(admin::list_applications))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/stats/weekly", get(admin::weekly_stats))
        .route("/admin/tags", get(tags::list_tags))
        .route("/admin/tags/rename", put(tags::rename_tag))
        .route("/admin/tags/merge", post(tags::merge_tags))
        .route("/admin/tags/{tag_name}", delete(tags::delete_tag));

    let superadmin_routes = Router::new()
        .route("/superadmin/stats", get(superadmin::stats))
        .route("/superadmin/users", get(superadmin::list_users))
        .route("/superadmin/users/{user_id}", delete(superadmin::delete_user))
        .route("/superadmin/users/{user_id}/role", patch(superadmin::update_role))
        .route("/superadmin/system/logs", get(superadmin::system_logs));

    let upload_routes = Router::new()
        .route(
            "/uploads",
            post(uploads::upload_image).layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_SIZE)),
        )
        .route("/uploads/{upload_id}", get(uploads::get_upload));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(auth_routes)
        .merge(post_routes)
        .merge(points_routes)
        .merge(line_routes)
        .merge(announcement_routes)
        .merge(stats_routes)
        .merge(admin_routes)
        .merge(superadmin_routes)
        .merge(upload_routes)
        .with_state(state)
}
