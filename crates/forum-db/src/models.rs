//! Database row types. These map directly to SQLite rows and stay distinct
//! from the forum-types API models so the storage layer owns its own shapes.

use forum_types::models::VoteType;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub total_points: i64,
    pub level: i64,
    pub last_login_date: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct AdminRow {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

/// Author columns joined onto posts, replies, reports and groups.
#[derive(Debug, Clone)]
pub struct AuthorRow {
    pub id: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub cover_image_url: Option<String>,
    pub author_id: String,
    pub tags: Option<Vec<String>>,
    pub view_count: i64,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub is_closed: bool,
    pub is_pinned: bool,
    pub pinned_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub reply_count: i64,
    pub author: Option<AuthorRow>,
}

pub struct NewPost<'a> {
    pub title: &'a str,
    pub category: Option<&'a str>,
    pub summary: Option<&'a str>,
    pub cover_image_url: Option<&'a str>,
    pub tags: Option<&'a [String]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSort {
    Latest,
    Views,
    Replies,
}

#[derive(Debug, Clone)]
pub struct ReplyRow {
    pub id: String,
    pub post_id: String,
    pub parent_reply_id: Option<String>,
    pub author_id: String,
    pub content: String,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub created_at: String,
    pub author: Option<AuthorRow>,
}

#[derive(Debug, Clone)]
pub struct ReportRow {
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
    pub reporter: Option<AuthorRow>,
}

#[derive(Debug, Clone)]
pub struct PointRecordRow {
    pub id: String,
    pub user_id: String,
    pub points: i64,
    pub reason: String,
    pub created_at: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LineApplicationRow {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct LineGroupRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub qr_code_url: String,
    pub manager_id: String,
    pub is_active: bool,
    pub is_private: bool,
    pub admin_approved: bool,
    pub member_count: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub manager: Option<AuthorRow>,
}

pub struct NewLineGroup<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub qr_code_url: &'a str,
    pub manager_id: &'a str,
    pub is_private: bool,
}

#[derive(Debug, Default)]
pub struct LineGroupChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub qr_code_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct GroupApplicationRow {
    pub id: String,
    pub user_id: String,
    pub group_id: String,
    pub message: Option<String>,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub applicant: Option<AuthorRow>,
}

#[derive(Debug, Clone)]
pub struct GroupReportRow {
    pub id: String,
    pub group_id: String,
    pub reporter_id: String,
    pub reason: String,
    pub description: Option<String>,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub reporter: Option<AuthorRow>,
}

#[derive(Debug, Clone)]
pub struct CreationRequestRow {
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
    pub requester: Option<AuthorRow>,
}

#[derive(Debug, Clone)]
pub struct AnnouncementRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_by: String,
    pub is_active: bool,
    pub priority: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Default)]
pub struct AnnouncementChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub priority: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub total_points: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct UploadRow {
    pub id: String,
    pub owner_id: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: String,
}

// -- Operation outcomes --

/// Result of charging points against a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deduction {
    Applied { total: i64 },
    Insufficient { current: i64 },
    UnknownUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub current: Option<VoteType>,
    /// True when an upvote was cast where the user had no vote before.
    pub fresh_upvote: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    Pinned,
    NotFound,
    AlreadyPinned,
    NotOwner,
    Insufficient { current: i64 },
}

#[derive(Debug, Clone)]
pub enum GroupCreation {
    Created(LineGroupRow),
    Insufficient { current: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationReviewOutcome {
    NotFound,
    AlreadyReviewed,
    Insufficient { current: i64 },
    Rejected,
    Approved { group_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    GroupNotFound,
    GroupInactive,
    AlreadyPending,
    AlreadyApproved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteTotals {
    pub users: i64,
    pub posts: i64,
    pub replies: i64,
    pub groups: i64,
    pub group_applications: i64,
    pub group_reports: i64,
}
