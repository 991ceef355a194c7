use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ReviewDecision, Role, VoteType};

// -- JWT Claims --

/// Claims carried by every bearer token the API issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Shared --

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub id: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total + page_size - 1) / page_size
        } else {
            0
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Admin auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminRegisterRequest {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminAuthResponse {
    pub success: bool,
    pub admin_id: String,
    pub email: String,
    pub username: Option<String>,
    pub message: String,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub title: String,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub cover_image_url: Option<String>,
    pub author_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub reply_count: i64,
    pub view_count: i64,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub tags: Option<Vec<String>>,
    pub is_closed: bool,
    pub is_pinned: bool,
    pub pinned_at: Option<String>,
    pub author: Option<Author>,
    pub user_vote: Option<VoteType>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostResponse,
    pub replies: Vec<ReplyResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReplyRequest {
    pub content: String,
    pub parent_reply_id: Option<String>,
}

/// A reply. `replies` holds nested children in the thread view and is empty
/// in flat listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyResponse {
    pub id: String,
    pub content: String,
    pub post_id: String,
    pub author_id: String,
    pub created_at: String,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub author: Option<Author>,
    pub parent_reply_id: Option<String>,
    pub replies: Vec<ReplyResponse>,
    pub user_vote: Option<VoteType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarPost {
    pub id: String,
    pub title: String,
    pub reply_count: i64,
}

// -- Votes & reports --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoteRequest {
    pub vote_type: VoteType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub user_vote: Option<VoteType>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportRequest {
    pub reason: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    pub id: String,
    pub post_id: String,
    pub reply_id: Option<String>,
    pub reporter_id: String,
    pub reason: String,
    pub description: Option<String>,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub reporter: Option<Author>,
}

// -- Points & profile --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub total_points: i64,
    pub level: i64,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RankingResponse {
    pub ranking: i64,
    pub total_users: i64,
    pub total_points: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: String,
    pub user_id: String,
    pub points: i64,
    pub reason: String,
    pub created_at: String,
}

// -- LINE applications --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLineApplicationRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LineApplicationResponse {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub status: String,
    pub created_at: String,
}

// -- LINE groups --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineGroupResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub qr_code_url: String,
    pub manager_id: String,
    pub is_active: bool,
    pub is_private: bool,
    pub member_count: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub manager: Option<Author>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLineGroupRequest {
    pub name: String,
    pub description: Option<String>,
    pub qr_code_url: String,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateLineGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub qr_code_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupApplicationRequest {
    pub group_id: String,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupApplicationResponse {
    pub id: String,
    pub user_id: String,
    pub group_id: String,
    pub message: Option<String>,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub user: Option<Author>,
    pub group: Option<LineGroupResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewRequest {
    pub status: ReviewDecision,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupReportRequest {
    pub group_id: String,
    pub reason: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupReportResponse {
    pub id: String,
    pub group_id: String,
    pub reporter_id: String,
    pub reason: String,
    pub description: Option<String>,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub reporter: Option<Author>,
    pub group: Option<LineGroupResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreationRequestBody {
    pub name: String,
    pub description: Option<String>,
    pub qr_code_url: String,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreationRequestResponse {
    pub id: String,
    pub requester_id: String,
    pub name: String,
    pub description: Option<String>,
    pub qr_code_url: String,
    pub is_private: bool,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub requester: Option<Author>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreationReviewRequest {
    pub status: ReviewDecision,
    pub rejection_reason: Option<String>,
}

// -- Announcements --

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnouncementResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_by: String,
    pub is_active: bool,
    pub priority: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub author: Option<Author>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub priority: Option<i64>,
    pub is_active: Option<bool>,
}

// -- Stats --

#[derive(Debug, Serialize, Deserialize)]
pub struct CommunityStats {
    pub active_members: i64,
    pub threads_this_week: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_threads: i64,
    pub total_posts: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyBucket {
    pub week: String,
    pub week_start: String,
    pub week_end: String,
    pub new_users: i64,
    pub new_posts: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub weeks: i64,
    pub weekly_data: Vec<WeeklyBucket>,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminCreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminUpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub total_points: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClosePostResponse {
    pub success: bool,
    pub post_id: String,
}

// -- Tags --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameTagRequest {
    pub old_tag: String,
    pub new_tag: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenameTagResponse {
    pub success: bool,
    pub updated: usize,
    pub old_tag: String,
    pub new_tag: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteTagResponse {
    pub success: bool,
    pub updated: usize,
    pub tag: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeTagsRequest {
    pub source_tags: Vec<String>,
    pub target_tag: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MergeTagsResponse {
    pub success: bool,
    pub updated: usize,
    pub source_tags: Vec<String>,
    pub target_tag: String,
}

// -- Superadmin --

#[derive(Debug, Serialize, Deserialize)]
pub struct SuperadminStats {
    pub total_users: i64,
    pub total_posts: i64,
    pub total_replies: i64,
    pub total_groups: i64,
    pub total_applications: i64,
    pub total_reports: i64,
    pub role_distribution: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleUpdateRequest {
    pub new_role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleUpdateResponse {
    pub success: bool,
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteUserResponse {
    pub success: bool,
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub id: String,
    pub user_id: String,
    pub username: Option<String>,
    pub points: i64,
    pub reason: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemLogsResponse {
    pub message: String,
    pub logs: Vec<SystemLogEntry>,
}

// -- Uploads --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
}
