use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use forum_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::middleware::create_token;
use crate::validate::require_len;
use crate::{AppState, run_blocking};

/// Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Usernames are 1..=50 characters, passwords 6..=72 bytes.
pub(crate) fn validate_credentials(email: &str, username: &str, password: &str) -> Result<(), ApiError> {
    if !email.contains('@') {
        return Err(ApiError::validation("A valid email address is required"));
    }
    require_len("username", username.trim(), 1, 50)?;
    if password.len() < 6 || password.len() > 72 {
        return Err(ApiError::validation("password must be between 6 and 72 bytes"));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    let username = req.username.trim().to_string();
    validate_credentials(&email, &username, &req.password)?;

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let id = user_id.to_string();
    let user_email = email.clone();
    run_blocking(&state, move |db| {
        if db.get_user_by_email(&user_email)?.is_some() {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        db.create_user(&id, &user_email, &username, &password_hash)?;
        Ok(())
    })
    .await?;

    info!(user_id = %user_id, "User registered");
    let token = create_token(&state.jwt_secret, user_id, &email, state.token_ttl_days)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    let user = run_blocking(&state, move |db| Ok(db.get_user_by_email(&email)?))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !verify_password(&req.password, &user.password) {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored user id is not a UUID: {}", e)))?;
    let token = create_token(&state.jwt_secret, user_id, &user.email, state.token_ttl_days)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}
