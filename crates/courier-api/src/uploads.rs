use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use tracing::error;
use uuid::Uuid;

use courier_types::api::Claims;
use courier_types::models::FileAttachment;

use crate::error::ApiError;
use crate::state::AppState;

/// At most 10 files per upload request, 10 MB each.
pub const MAX_FILES_PER_UPLOAD: usize = 10;
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Mime types accepted for message attachments: images, documents, video
/// and audio. Everything else is rejected up front.
const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/quicktime",
    "video/webm",
    "audio/mpeg",
    "audio/ogg",
    "audio/wav",
    "audio/webm",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
];

pub(crate) fn allowed_mime(mime: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime)
}

/// POST /conversations/:id/upload-files — multipart upload of attachment
/// blobs ahead of a send. Returns the metadata list the client includes in
/// the following message.
pub async fn upload_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    // Upload is participant-gated like every other message operation.
    let db = state.db.clone();
    let participant =
        tokio::task::spawn_blocking(move || db.is_participant(conversation_id, claims.sub))
            .await??;
    if !participant {
        return Err(ApiError::PermissionDenied);
    }

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| {
            error!("failed to create upload directory: {}", e);
            ApiError::Internal
        })?;

    let mut uploaded: Vec<FileAttachment> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("bad multipart payload: {e}")))?
    {
        if uploaded.len() >= MAX_FILES_PER_UPLOAD {
            return Err(ApiError::Validation(format!(
                "at most {MAX_FILES_PER_UPLOAD} files per upload"
            )));
        }

        let mime_type = field
            .content_type()
            .ok_or_else(|| ApiError::Validation("file part is missing a content type".into()))?
            .to_string();
        if !allowed_mime(&mime_type) {
            return Err(ApiError::Validation(format!(
                "mime type '{mime_type}' is not allowed"
            )));
        }

        let file_name = field
            .file_name()
            .unwrap_or("attachment")
            .to_string();

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("failed to read file part: {e}")))?;
        if bytes.is_empty() {
            return Err(ApiError::Validation("empty file part".into()));
        }
        if bytes.len() > MAX_FILE_SIZE {
            return Err(ApiError::Validation(format!(
                "file '{file_name}' exceeds {MAX_FILE_SIZE} bytes"
            )));
        }

        let id = Uuid::new_v4();
        let path = state.upload_dir.join(id.to_string());
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            error!("failed to write upload {}: {}", path.display(), e);
            ApiError::Internal
        })?;

        let db = state.db.clone();
        let size = bytes.len() as u64;
        let (name, mime) = (file_name.clone(), mime_type.clone());
        tokio::task::spawn_blocking(move || db.insert_upload(id, claims.sub, &name, size, &mime))
            .await??;

        uploaded.push(FileAttachment {
            file_url: format!("/files/{id}"),
            file_name,
            file_size: size,
            mime_type,
        });
    }

    if uploaded.is_empty() {
        return Err(ApiError::Validation("no file parts in request".into()));
    }

    Ok((StatusCode::CREATED, Json(uploaded)))
}

/// GET /files/:id — stream back an uploaded blob.
pub async fn download_file(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Ids are uuids; parsing also rules out path traversal.
    let id: Uuid = file_id
        .parse()
        .map_err(|_| ApiError::Validation("bad file id".into()))?;

    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || db.get_upload(id))
        .await??
        .ok_or(ApiError::NotFound)?;

    let path = state.upload_dir.join(id.to_string());
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        error!("failed to read upload {}: {}", path.display(), e);
        ApiError::NotFound
    })?;

    Ok(([(axum::http::header::CONTENT_TYPE, row.mime_type)], bytes))
}
