use axum::{Json, extract::State, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use forum_types::api::{AdminAuthResponse, AdminLoginRequest, AdminRegisterRequest};

use crate::auth::{hash_password, verify_password};
use crate::error::ApiError;
use crate::{AppState, run_blocking};

const REGISTRATION_CLOSED: &str = "Admin registration is disabled";

/// POST /admin-auth/register. Bootstraps the first admin account; later
/// accounts need `allow_admin_registration`.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<AdminRegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    if !email.contains('@') {
        return Err(ApiError::validation("A valid email address is required"));
    }
    if req.password.len() < 6 || req.password.len() > 72 {
        return Err(ApiError::validation("password must be between 6 and 72 bytes"));
    }

    let password_hash = hash_password(&req.password)?;
    let admin_id = Uuid::new_v4().to_string();
    let username = req.username.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());

    let open = state.allow_admin_registration;
    let (id, mail, name) = (admin_id.clone(), email.clone(), username.clone());
    run_blocking(&state, move |db| {
        if !open && db.has_admins()? {
            return Err(ApiError::forbidden(REGISTRATION_CLOSED));
        }
        if db.get_admin_by_email(&mail)?.is_some() {
            return Err(ApiError::bad_request("Email already registered"));
        }
        if open {
            db.create_admin(&id, &mail, name.as_deref(), &password_hash)?;
        } else if !db.create_first_admin(&id, &mail, name.as_deref(), &password_hash)? {
            return Err(ApiError::forbidden(REGISTRATION_CLOSED));
        }
        Ok(())
    })
    .await?;

    info!(admin_id = %admin_id, "Admin account registered");
    Ok(Json(AdminAuthResponse {
        success: true,
        admin_id,
        email,
        username,
        message: "Registration successful".into(),
    }))
}

/// POST /admin-auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    let admin = run_blocking(&state, move |db| Ok(db.get_admin_by_email(&email)?))
        .await?
        .filter(|admin| admin.is_active)
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !verify_password(&req.password, &admin.password_hash) {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let id = admin.id.clone();
    run_blocking(&state, move |db| Ok(db.touch_admin_login(&id)?)).await?;
    info!(admin_id = %admin.id, "Admin signed in");

    Ok(Json(AdminAuthResponse {
        success: true,
        admin_id: admin.id,
        email: admin.email,
        username: admin.username,
        message: "Login successful".into(),
    }))
}
