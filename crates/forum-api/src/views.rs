//! Row to response conversions.

use forum_db::models::{
    AnnouncementRow, AuthorRow, CreationRequestRow, GroupApplicationRow, GroupReportRow,
    LineGroupRow, PostRow, ReplyRow, ReportRow, UserRow,
};
use forum_types::api::{
    AnnouncementResponse, Author, CreationRequestResponse, GroupApplicationResponse,
    GroupReportResponse, LineGroupResponse, PostResponse, ReplyResponse, ReportResponse,
    UserProfile,
};
use forum_types::models::{Role, VoteType};

pub(crate) fn author(row: AuthorRow) -> Author {
    Author {
        id: row.id,
        username: row.username,
        avatar_url: row.avatar_url,
    }
}

pub(crate) fn post(row: PostRow, user_vote: Option<VoteType>) -> PostResponse {
    PostResponse {
        id: row.id,
        title: row.title,
        category: row.category,
        summary: row.summary,
        cover_image_url: row.cover_image_url,
        author_id: row.author_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
        reply_count: row.reply_count,
        view_count: row.view_count,
        upvote_count: row.upvote_count,
        downvote_count: row.downvote_count,
        tags: row.tags,
        is_closed: row.is_closed,
        is_pinned: row.is_pinned,
        pinned_at: row.pinned_at,
        author: row.author.map(author),
        user_vote,
    }
}

pub(crate) fn reply(row: ReplyRow, user_vote: Option<VoteType>) -> ReplyResponse {
    ReplyResponse {
        id: row.id,
        content: row.content,
        post_id: row.post_id,
        author_id: row.author_id,
        created_at: row.created_at,
        upvote_count: row.upvote_count,
        downvote_count: row.downvote_count,
        author: row.author.map(author),
        parent_reply_id: row.parent_reply_id,
        replies: Vec::new(),
        user_vote,
    }
}

pub(crate) fn report(row: ReportRow) -> ReportResponse {
    ReportResponse {
        id: row.id,
        post_id: row.post_id,
        reply_id: row.reply_id,
        reporter_id: row.reporter_id,
        reason: row.reason,
        description: row.description,
        status: row.status,
        reviewed_by: row.reviewed_by,
        reviewed_at: row.reviewed_at,
        created_at: row.created_at,
        reporter: row.reporter.map(author),
    }
}

pub(crate) fn role(raw: &str) -> Role {
    raw.parse().unwrap_or(Role::User)
}

/// `with_email` controls whether the address is exposed.
pub(crate) fn profile(row: UserRow, with_email: bool) -> UserProfile {
    UserProfile {
        role: role(&row.role),
        id: row.id,
        username: Some(row.username),
        email: with_email.then_some(row.email),
        avatar_url: row.avatar_url,
        total_points: row.total_points,
        level: row.level,
        created_at: row.created_at,
    }
}

pub(crate) fn group(row: LineGroupRow) -> LineGroupResponse {
    LineGroupResponse {
        id: row.id,
        name: row.name,
        description: row.description,
        qr_code_url: row.qr_code_url,
        manager_id: row.manager_id,
        is_active: row.is_active,
        is_private: row.is_private,
        member_count: row.member_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
        manager: row.manager.map(author),
    }
}

pub(crate) fn application(
    row: GroupApplicationRow,
    group: Option<LineGroupResponse>,
) -> GroupApplicationResponse {
    GroupApplicationResponse {
        id: row.id,
        user_id: row.user_id,
        group_id: row.group_id,
        message: row.message,
        status: row.status,
        reviewed_by: row.reviewed_by,
        reviewed_at: row.reviewed_at,
        created_at: row.created_at,
        user: row.applicant.map(author),
        group,
    }
}

pub(crate) fn group_report(row: GroupReportRow, group: Option<LineGroupResponse>) -> GroupReportResponse {
    GroupReportResponse {
        id: row.id,
        group_id: row.group_id,
        reporter_id: row.reporter_id,
        reason: row.reason,
        description: row.description,
        status: row.status,
        reviewed_by: row.reviewed_by,
        reviewed_at: row.reviewed_at,
        created_at: row.created_at,
        reporter: row.reporter.map(author),
        group,
    }
}

pub(crate) fn creation_request(row: CreationRequestRow) -> CreationRequestResponse {
    CreationRequestResponse {
        id: row.id,
        requester_id: row.requester_id,
        name: row.name,
        description: row.description,
        qr_code_url: row.qr_code_url,
        is_private: row.is_private,
        status: row.status,
        reviewed_by: row.reviewed_by,
        reviewed_at: row.reviewed_at,
        rejection_reason: row.rejection_reason,
        created_at: row.created_at,
        updated_at: row.updated_at,
        requester: row.requester.map(author),
    }
}

pub(crate) fn announcement(row: AnnouncementRow, by: Option<AuthorRow>) -> AnnouncementResponse {
    AnnouncementResponse {
        id: row.id,
        title: row.title,
        content: row.content,
        created_by: row.created_by,
        is_active: row.is_active,
        priority: row.priority,
        created_at: row.created_at,
        updated_at: row.updated_at,
        author: by.map(author),
    }
}
