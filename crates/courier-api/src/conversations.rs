use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use uuid::Uuid;

use courier_types::api::{Claims, CreateConversationRequest, MarkReadResponse, PageQuery, Paginated};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let (items, total) =
        tokio::task::spawn_blocking(move || db.list_conversations(claims.sub, &page)).await??;

    Ok(Json(Paginated {
        items,
        total,
        page: page.page,
        limit: page.limit(),
    }))
}

/// Find-or-create the direct conversation with another user. Concurrent
/// first-contact from both sides resolves to the same record; the status is
/// 201 either way.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let (conversation, _created) =
        tokio::task::spawn_blocking(move || db.find_or_create_direct(claims.sub, req.other_user_id))
            .await??;

    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let conversation = tokio::task::spawn_blocking(move || db.get_conversation(id))
        .await??
        .ok_or(ApiError::NotFound)?;

    if !conversation.is_participant(claims.sub) {
        return Err(ApiError::PermissionDenied);
    }
    Ok(Json(conversation))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let updated =
        tokio::task::spawn_blocking(move || db.mark_conversation_read(id, claims.sub)).await??;

    Ok(Json(MarkReadResponse { updated }))
}
