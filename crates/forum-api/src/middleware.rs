use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::warn;
use uuid::Uuid;

use forum_db::models::{AdminRow, UserRow};
use forum_types::api::Claims;
use forum_types::models::Role;

use crate::error::ApiError;
use crate::points::DAILY_LOGIN_BONUS;
use crate::{AppState, run_blocking};

pub const ADMIN_ID_HEADER: &str = "x-admin-id";
pub const ADMIN_EMAIL_HEADER: &str = "x-admin-email";

const INVALID_TOKEN: &str = "Invalid or expired token";

pub fn create_token(secret: &str, user_id: Uuid, email: &str, ttl_days: i64) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(ttl_days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::unauthorized(INVALID_TOKEN))
}

/// Pulls the token out of `Authorization: Bearer <token>`. `Ok(None)` means
/// the header is absent.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid authorization scheme"))?;

    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::unauthorized("Invalid authorization scheme"));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("Invalid bearer token"));
    }
    Ok(Some(token))
}

/// A signed-in forum user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    fn from_row(row: UserRow) -> Self {
        Self {
            role: row.role.parse().unwrap_or(Role::User),
            id: row.id,
            email: row.email,
            username: row.username,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin access required"))
        }
    }
}

/// Validates the token, loads the user and pays the daily login bonus.
async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let claims = decode_token(&state.jwt_secret, token)?;
    let user_id = claims.sub.to_string();
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();

    run_blocking(state, move |db| {
        let user = db
            .get_user_by_id(&user_id)?
            .ok_or_else(|| ApiError::unauthorized(INVALID_TOKEN))?;
        if user.last_login_date.as_deref() != Some(today.as_str()) {
            if let Err(e) = db.record_daily_login(&user.id, &today, DAILY_LOGIN_BONUS) {
                warn!(user_id = %user.id, "Daily login bookkeeping failed: {:#}", e);
            }
        }
        Ok(AuthUser::from_row(user))
    })
    .await
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;
        authenticate(state, token).await
    }
}

/// The caller if a valid bearer token was sent, otherwise anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<String> {
        self.0.as_ref().map(|u| u.id.clone())
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(&parts.headers) {
            Ok(Some(token)) => token,
            _ => return Ok(MaybeUser(None)),
        };
        Ok(MaybeUser(authenticate(state, token).await.ok()))
    }
}

/// Whoever passed a staff check: a staff user or an admin account.
#[derive(Debug, Clone)]
pub enum Staff {
    User(AuthUser),
    Admin(AdminRow),
}

impl Staff {
    pub fn id(&self) -> &str {
        match self {
            Staff::User(user) => &user.id,
            Staff::Admin(admin) => &admin.id,
        }
    }
}

async fn admin_from_headers(state: &AppState, headers: &HeaderMap) -> Result<Option<AdminRow>, ApiError> {
    let id = headers.get(ADMIN_ID_HEADER).and_then(|v| v.to_str().ok());
    let email = headers.get(ADMIN_EMAIL_HEADER).and_then(|v| v.to_str().ok());
    let (Some(id), Some(email)) = (id, email) else {
        return Ok(None);
    };

    let (id, email) = (id.to_string(), email.to_string());
    run_blocking(state, move |db| Ok(db.get_active_admin(&id, &email)?)).await
}

impl FromRequestParts<AppState> for Staff {
    type Rejection = ApiError;

    /// Bearer token first, then the admin credential headers.
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let has_admin_headers =
            parts.headers.contains_key(ADMIN_ID_HEADER) && parts.headers.contains_key(ADMIN_EMAIL_HEADER);

        let bearer_error = match bearer_token(&parts.headers) {
            Ok(Some(token)) => match authenticate(state, token).await {
                Ok(user) if user.is_staff() => return Ok(Staff::User(user)),
                Ok(_) => ApiError::forbidden("Admin access required"),
                Err(e) => e,
            },
            Ok(None) if has_admin_headers => ApiError::unauthorized("Invalid admin credentials"),
            Ok(None) => {
                return Err(ApiError::unauthorized(
                    "Missing Authorization header or Admin credentials",
                ));
            }
            Err(e) => e,
        };

        if has_admin_headers {
            if let Some(admin) = admin_from_headers(state, &parts.headers).await? {
                return Ok(Staff::Admin(admin));
            }
        }
        Err(bearer_error)
    }
}

/// Any authenticated caller: a bearer user of any role, or an admin account
/// sent through the credential headers. Handlers decide what it may touch.
#[derive(Debug, Clone)]
pub enum Actor {
    User(AuthUser),
    Admin(AdminRow),
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::User(user) => &user.id,
            Actor::Admin(admin) => &admin.id,
        }
    }

    pub fn is_staff(&self) -> bool {
        match self {
            Actor::User(user) => user.is_staff(),
            Actor::Admin(_) => true,
        }
    }
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let bearer = match bearer_token(&parts.headers) {
            Ok(Some(token)) => authenticate(state, token).await,
            Ok(None) => Err(ApiError::unauthorized("Missing Authorization header")),
            Err(e) => Err(e),
        };
        match bearer {
            Ok(user) => Ok(Actor::User(user)),
            Err(e) => match admin_from_headers(state, &parts.headers).await? {
                Some(admin) => Ok(Actor::Admin(admin)),
                None => Err(e),
            },
        }
    }
}

/// A bearer user holding the superadmin role.
#[derive(Debug, Clone)]
pub struct Superadmin(pub AuthUser);

impl FromRequestParts<AppState> for Superadmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Superadmin {
            return Err(ApiError::forbidden("SuperAdmin access required"));
        }
        Ok(Superadmin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(bearer_token(&HeaderMap::new()).unwrap(), None);
        assert_eq!(bearer_token(&headers("Bearer abc")).unwrap(), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer  abc ")).unwrap(), Some("abc"));

        let err = bearer_token(&headers("Basic abc")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid authorization scheme");
        let err = bearer_token(&headers("Bearer")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid bearer token");
    }

    #[test]
    fn token_round_trip_and_rejection() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id, "a@example.com", 1).unwrap();

        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@example.com");

        let err = decode_token("other-secret", &token).unwrap_err();
        assert_eq!(err.to_string(), INVALID_TOKEN);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token("secret", Uuid::new_v4(), "a@example.com", -2).unwrap();
        assert!(decode_token("secret", &token).is_err());
    }
}
