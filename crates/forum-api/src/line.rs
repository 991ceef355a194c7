use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use forum_db::models::{
    ApplyOutcome, CreationReviewOutcome, GroupApplicationRow, GroupCreation, LineGroupChanges,
    LineGroupRow, NewLineGroup,
};
use forum_db::{Database, new_id};
use forum_types::api::{
    CreateLineApplicationRequest, CreateLineGroupRequest, CreationRequestBody,
    CreationRequestResponse, CreationReviewRequest, GroupApplicationRequest,
    GroupApplicationResponse, GroupReportRequest, GroupReportResponse, LineApplicationResponse,
    LineGroupResponse, ReviewRequest, UpdateLineGroupRequest,
};

use crate::error::ApiError;
use crate::middleware::{Actor, AuthUser, Staff};
use crate::points::{CREATE_GROUP_REWARD, PRIVATE_GROUP_COST};
use crate::validate::{non_blank, optional_max_len, require_len};
use crate::{AppState, run_blocking, views};

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status_filter: Option<String>,
}

impl StatusQuery {
    fn status(&self) -> Option<String> {
        non_blank(self.status_filter.clone())
    }
}

fn insufficient_for_private_group(current: i64) -> ApiError {
    ApiError::bad_request(format!(
        "Insufficient points to create private group. Required: {}, Current: {}",
        PRIVATE_GROUP_COST, current
    ))
}

/// Managers act on their own groups; staff act on any group.
fn ensure_can_manage(actor: &Actor, group: &LineGroupRow) -> Result<(), ApiError> {
    if actor.is_staff() || group.manager_id == actor.id() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the group manager or staff can do this"))
    }
}

fn load_group(db: &Database, group_id: &str) -> Result<LineGroupRow, ApiError> {
    db.get_line_group(group_id)?
        .ok_or_else(|| ApiError::not_found("Group not found"))
}

/// Validated name, description and QR code URL shared by group creation and
/// creation requests.
struct GroupFields {
    name: String,
    description: Option<String>,
    qr_code_url: String,
}

fn group_fields(
    name: &str,
    description: Option<String>,
    qr_code_url: &str,
) -> Result<GroupFields, ApiError> {
    let name = name.trim().to_string();
    require_len("name", &name, 3, 100)?;
    let description = non_blank(description);
    optional_max_len("description", description.as_deref(), 500)?;
    let qr_code_url = qr_code_url.trim().to_string();
    if qr_code_url.is_empty() {
        return Err(ApiError::validation("qr_code_url is required"));
    }
    Ok(GroupFields {
        name,
        description,
        qr_code_url,
    })
}

/// Pairs each application with its group, fetched in one query.
pub(crate) fn with_groups(
    db: &Database,
    rows: Vec<GroupApplicationRow>,
) -> Result<Vec<GroupApplicationResponse>, ApiError> {
    let ids: Vec<String> = rows.iter().map(|r| r.group_id.clone()).collect();
    let groups = db.line_groups_by_ids(&ids)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let group = groups.get(&row.group_id).cloned().map(views::group);
            views::application(row, group)
        })
        .collect())
}

// -- LINE applications --

/// POST /line-applications
pub async fn create_line_application(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateLineApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = req.message.trim().to_string();
    require_len("message", &message, 10, 800)?;

    let row = run_blocking(&state, move |db| {
        Ok(db.create_line_application(&new_id(), &user.id, &message)?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(LineApplicationResponse {
            id: row.id,
            user_id: row.user_id,
            message: row.message,
            status: row.status,
            created_at: row.created_at,
        }),
    ))
}

// -- Groups --

#[derive(Debug, Deserialize)]
pub struct ListGroupsQuery {
    #[serde(default = "default_true")]
    pub active_only: bool,
}

fn default_true() -> bool {
    true
}

/// GET /line-groups
pub async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<ListGroupsQuery>,
) -> Result<Json<Vec<LineGroupResponse>>, ApiError> {
    let rows = run_blocking(&state, move |db| Ok(db.list_line_groups(query.active_only)?)).await?;
    Ok(Json(rows.into_iter().map(views::group).collect()))
}

/// GET /line-groups/{group_id}
pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<LineGroupResponse>, ApiError> {
    let row = run_blocking(&state, move |db| load_group(db, &group_id)).await?;
    Ok(Json(views::group(row)))
}

/// POST /line-groups. The staff member creating the group becomes its
/// manager, so this takes a bearer user rather than an admin account.
pub async fn create_group(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateLineGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_staff()?;
    let fields = group_fields(&req.name, req.description, &req.qr_code_url)?;
    let is_private = req.is_private;

    let row = run_blocking(&state, move |db| {
        let outcome = db.create_line_group(
            &new_id(),
            &NewLineGroup {
                name: &fields.name,
                description: fields.description.as_deref(),
                qr_code_url: &fields.qr_code_url,
                manager_id: &user.id,
                is_private,
            },
            PRIVATE_GROUP_COST,
            CREATE_GROUP_REWARD,
        )?;
        match outcome {
            GroupCreation::Created(row) => Ok(row),
            GroupCreation::Insufficient { current } => Err(insufficient_for_private_group(current)),
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(views::group(row))))
}

/// PATCH /line-groups/{group_id}
pub async fn update_group(
    State(state): State<AppState>,
    actor: Actor,
    Path(group_id): Path<String>,
    Json(req): Json<UpdateLineGroupRequest>,
) -> Result<Json<LineGroupResponse>, ApiError> {
    let name = match req.name {
        Some(name) => {
            let name = name.trim().to_string();
            require_len("name", &name, 3, 100)?;
            Some(name)
        }
        None => None,
    };
    optional_max_len("description", req.description.as_deref(), 500)?;
    let qr_code_url = match req.qr_code_url {
        Some(url) if url.trim().is_empty() => {
            return Err(ApiError::validation("qr_code_url cannot be empty"));
        }
        other => other.map(|url| url.trim().to_string()),
    };
    let changes = LineGroupChanges {
        name,
        description: req.description,
        qr_code_url,
        is_active: req.is_active,
    };
    if changes.name.is_none()
        && changes.description.is_none()
        && changes.qr_code_url.is_none()
        && changes.is_active.is_none()
    {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let row = run_blocking(&state, move |db| {
        let group = load_group(db, &group_id)?;
        ensure_can_manage(&actor, &group)?;
        db.update_line_group(&group_id, &changes)?
            .ok_or_else(|| ApiError::not_found("Group not found"))
    })
    .await?;
    Ok(Json(views::group(row)))
}

/// DELETE /line-groups/{group_id}
pub async fn delete_group(
    State(state): State<AppState>,
    actor: Actor,
    Path(group_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted_by = actor.id().to_string();
    run_blocking(&state, move |db| {
        let group = load_group(db, &group_id)?;
        ensure_can_manage(&actor, &group)?;
        db.delete_line_group(&group_id)?;
        info!(group_id = %group_id, deleted_by = %deleted_by, "LINE group deleted");
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Group applications --

/// POST /line-groups/{group_id}/apply
pub async fn apply_to_group(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<String>,
    Json(req): Json<GroupApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.group_id != group_id {
        return Err(ApiError::bad_request("Group ID mismatch"));
    }
    let message = non_blank(req.message);
    optional_max_len("message", message.as_deref(), 500)?;

    let application = run_blocking(&state, move |db| {
        let id = new_id();
        match db.apply_to_group(&id, &user.id, &group_id, message.as_deref())? {
            ApplyOutcome::Created => {}
            ApplyOutcome::GroupNotFound => return Err(ApiError::not_found("Group not found")),
            ApplyOutcome::GroupInactive => return Err(ApiError::bad_request("Group is not active")),
            ApplyOutcome::AlreadyPending => {
                return Err(ApiError::bad_request("You already have a pending application"));
            }
            ApplyOutcome::AlreadyApproved => {
                return Err(ApiError::bad_request("You are already approved for this group"));
            }
        }
        let row = db
            .get_group_application(&id)?
            .ok_or_else(|| ApiError::not_found("Application not found"))?;
        let group = db.get_line_group(&group_id)?.map(views::group);
        Ok(views::application(row, group))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /line-groups/my-applications
pub async fn my_applications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<GroupApplicationResponse>>, ApiError> {
    let status = query.status();
    let items = run_blocking(&state, move |db| {
        let rows = db.applications_for_user(&user.id, status.as_deref())?;
        with_groups(db, rows)
    })
    .await?;
    Ok(Json(items))
}

/// GET /line-groups/my-managed-groups/applications
pub async fn managed_group_applications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<GroupApplicationResponse>>, ApiError> {
    let status = query.status();
    let items = run_blocking(&state, move |db| {
        let rows = db.applications_for_manager(&user.id, status.as_deref())?;
        with_groups(db, rows)
    })
    .await?;
    Ok(Json(items))
}

/// GET /line-groups/{group_id}/applications
pub async fn group_applications(
    State(state): State<AppState>,
    actor: Actor,
    Path(group_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<GroupApplicationResponse>>, ApiError> {
    let status = query.status();
    let items = run_blocking(&state, move |db| {
        let group = load_group(db, &group_id)?;
        ensure_can_manage(&actor, &group)?;
        let rows = db.applications_for_group(&group_id, status.as_deref())?;
        let group = views::group(group);
        Ok(rows
            .into_iter()
            .map(|row| views::application(row, Some(group.clone())))
            .collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(items))
}

/// PATCH /line-groups/applications/{application_id}/review
pub async fn review_application(
    State(state): State<AppState>,
    actor: Actor,
    Path(application_id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<GroupApplicationResponse>, ApiError> {
    let decision = req.status;
    let application = run_blocking(&state, move |db| {
        let application = db
            .get_group_application(&application_id)?
            .ok_or_else(|| ApiError::not_found("Application not found"))?;
        let group = load_group(db, &application.group_id)?;
        ensure_can_manage(&actor, &group)?;

        let row = db
            .review_group_application(&application_id, actor.id(), decision)?
            .ok_or_else(|| ApiError::not_found("Application not found"))?;
        info!(
            application_id = %application_id,
            reviewer = actor.id(),
            decision = decision.as_str(),
            "Group application reviewed"
        );
        let group = db.get_line_group(&row.group_id)?.map(views::group);
        Ok(views::application(row, group))
    })
    .await?;
    Ok(Json(application))
}

// -- Group reports --

/// POST /line-groups/{group_id}/report
pub async fn report_group(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_id): Path<String>,
    Json(req): Json<GroupReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.group_id != group_id {
        return Err(ApiError::bad_request("Group ID mismatch"));
    }
    let reason = req.reason.trim().to_string();
    require_len("reason", &reason, 10, 200)?;
    let description = non_blank(req.description);
    optional_max_len("description", description.as_deref(), 1000)?;

    let report = run_blocking(&state, move |db| {
        let group = load_group(db, &group_id)?;
        let row = db.create_group_report(
            &new_id(),
            &group_id,
            &user.id,
            &reason,
            description.as_deref(),
        )?;
        Ok(views::group_report(row, Some(views::group(group))))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /line-groups/reports
pub async fn list_group_reports(
    State(state): State<AppState>,
    _staff: Staff,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<GroupReportResponse>>, ApiError> {
    let status = query.status();
    let items = run_blocking(&state, move |db| {
        let rows = db.list_group_reports(status.as_deref())?;
        let ids: Vec<String> = rows.iter().map(|r| r.group_id.clone()).collect();
        let groups = db.line_groups_by_ids(&ids)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let group = groups.get(&row.group_id).cloned().map(views::group);
                views::group_report(row, group)
            })
            .collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(items))
}

/// PATCH /line-groups/reports/{report_id}/review
pub async fn review_group_report(
    State(state): State<AppState>,
    staff: Staff,
    Path(report_id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<GroupReportResponse>, ApiError> {
    let status = req.status.report_status();
    let report = run_blocking(&state, move |db| {
        let row = db
            .review_group_report(&report_id, staff.id(), status)?
            .ok_or_else(|| ApiError::not_found("Report not found"))?;
        let group = db.get_line_group(&row.group_id)?.map(views::group);
        Ok(views::group_report(row, group))
    })
    .await?;
    Ok(Json(report))
}

// -- Group creation requests --

/// POST /line-groups/creation-requests
pub async fn create_creation_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreationRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = group_fields(&req.name, req.description, &req.qr_code_url)?;
    let is_private = req.is_private;

    let row = run_blocking(&state, move |db| {
        Ok(db.create_creation_request(
            &new_id(),
            &user.id,
            &NewLineGroup {
                name: &fields.name,
                description: fields.description.as_deref(),
                qr_code_url: &fields.qr_code_url,
                manager_id: &user.id,
                is_private,
            },
        )?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(views::creation_request(row))))
}

/// GET /line-groups/creation-requests. Staff see every request, everyone
/// else only their own.
pub async fn list_creation_requests(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<CreationRequestResponse>>, ApiError> {
    let status = query.status();
    let requester = (!actor.is_staff()).then(|| actor.id().to_string());

    let rows = run_blocking(&state, move |db| {
        Ok(db.list_creation_requests(requester.as_deref(), status.as_deref())?)
    })
    .await?;
    Ok(Json(rows.into_iter().map(views::creation_request).collect()))
}

/// PATCH /line-groups/creation-requests/{request_id}/review
pub async fn review_creation_request(
    State(state): State<AppState>,
    staff: Staff,
    Path(request_id): Path<String>,
    Json(req): Json<CreationReviewRequest>,
) -> Result<Json<CreationRequestResponse>, ApiError> {
    let rejection_reason = non_blank(req.rejection_reason);
    optional_max_len("rejection_reason", rejection_reason.as_deref(), 500)?;
    let decision = req.status;

    let row = run_blocking(&state, move |db| {
        let outcome = db.review_creation_request(
            &request_id,
            staff.id(),
            decision,
            rejection_reason.as_deref(),
            PRIVATE_GROUP_COST,
            CREATE_GROUP_REWARD,
        )?;
        match outcome {
            CreationReviewOutcome::NotFound => {
                return Err(ApiError::not_found("Creation request not found"));
            }
            CreationReviewOutcome::AlreadyReviewed => {
                return Err(ApiError::bad_request("Request has already been reviewed"));
            }
            CreationReviewOutcome::Insufficient { current } => {
                return Err(insufficient_for_private_group(current));
            }
            CreationReviewOutcome::Rejected => {}
            CreationReviewOutcome::Approved { group_id } => {
                info!(request_id = %request_id, group_id = %group_id, "Group created from request");
            }
        }
        db.get_creation_request(&request_id)?
            .ok_or_else(|| ApiError::not_found("Creation request not found"))
    })
    .await?;
    Ok(Json(views::creation_request(row)))
}
