use axum::{
    Json,
    extract::{Path, State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use forum_types::api::UploadResponse;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::{AppState, run_blocking};

/// 5 MiB limit for images
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Media type of the request if it names an image, without parameters.
fn image_content_type(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let media = raw.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = media.strip_prefix("image/")?;
    if subtype.is_empty() {
        return None;
    }
    Some(media)
}

/// Writes the bytes under the upload directory and records them. The file
/// is removed again if the record cannot be stored.
pub(crate) async fn save_upload(
    state: &AppState,
    upload_id: &str,
    owner_id: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<(), ApiError> {
    tokio::fs::create_dir_all(&state.upload_dir).await.map_err(|e| {
        error!("Failed to create upload directory: {}", e);
        anyhow::Error::from(e)
    })?;

    let file_path = state.upload_dir.join(upload_id);
    let mut file = tokio::fs::File::create(&file_path).await.map_err(|e| {
        error!("Failed to create file {}: {}", file_path.display(), e);
        anyhow::Error::from(e)
    })?;
    file.write_all(bytes).await.map_err(|e| {
        error!("Failed to write file {}: {}", file_path.display(), e);
        anyhow::Error::from(e)
    })?;

    let (id, owner, mime, size) = (
        upload_id.to_string(),
        owner_id.to_string(),
        content_type.to_string(),
        bytes.len() as i64,
    );
    let recorded = run_blocking(state, move |db| Ok(db.insert_upload(&id, &owner, &mime, size)?)).await;
    if recorded.is_err() {
        if let Err(e) = tokio::fs::remove_file(&file_path).await {
            warn!("Failed to remove orphaned upload {}: {}", file_path.display(), e);
        }
    }
    recorded
}

/// POST /uploads. Raw image bytes in the body, saved under the upload
/// directory by id.
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = image_content_type(&headers)
        .ok_or_else(|| ApiError::bad_request("Only image uploads are allowed"))?;
    // Bodies over the route's limit fail here, before they are buffered.
    let bytes = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::bad_request(rejection.body_text())
        }
    })?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("Empty upload"));
    }

    let upload_id = Uuid::new_v4().to_string();
    let size = bytes.len() as u64;
    save_upload(&state, &upload_id, &user.id, &content_type, &bytes).await?;

    info!(upload_id = %upload_id, owner = %user.id, size, "Image uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: format!("/uploads/{}", upload_id),
            id: upload_id,
            size,
            content_type,
        }),
    ))
}

/// GET /uploads/{upload_id}
pub async fn get_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Only UUIDs ever touch the filesystem
    upload_id
        .parse::<Uuid>()
        .map_err(|_| ApiError::bad_request("Invalid upload id"))?;

    let id = upload_id.clone();
    let row = run_blocking(&state, move |db| Ok(db.get_upload(&id)?))
        .await?
        .ok_or_else(|| ApiError::not_found("Upload not found"))?;

    let file_path = state.upload_dir.join(&upload_id);
    let bytes = tokio::fs::read(&file_path).await.map_err(|e| {
        error!("Failed to read file {}: {}", file_path.display(), e);
        ApiError::not_found("Upload not found")
    })?;

    Ok(([(header::CONTENT_TYPE, row.content_type)], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use forum_db::Database;

    use crate::AppStateInner;

    fn with_type(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn only_image_types_pass() {
        assert_eq!(image_content_type(&with_type("image/png")).as_deref(), Some("image/png"));
        assert_eq!(
            image_content_type(&with_type("Image/JPEG; q=1")).as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(image_content_type(&with_type("image/")), None);
        assert_eq!(image_content_type(&with_type("application/pdf")), None);
        assert_eq!(image_content_type(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn failed_record_leaves_no_file_behind() {
        let upload_dir = std::env::temp_dir().join(format!("forum-upload-{}", Uuid::new_v4()));
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "secret".into(),
            token_ttl_days: 1,
            upload_dir: upload_dir.clone(),
            allow_admin_registration: false,
        });
        let upload_id = Uuid::new_v4().to_string();

        // No such user, so the owner foreign key rejects the record.
        let result = save_upload(&state, &upload_id, "missing-user", "image/png", b"png").await;
        assert!(result.is_err());
        assert!(!upload_dir.join(&upload_id).exists());

        let _ = std::fs::remove_dir_all(&upload_dir);
    }
}
