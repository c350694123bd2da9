use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use tracing::debug;
use uuid::Uuid;

use courier_types::api::{Claims, PageQuery, Paginated, SendMessageRequest};
use courier_types::events::GatewayEvent;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let (items, total) =
        tokio::task::spawn_blocking(move || db.list_messages(conversation_id, claims.sub, &page))
            .await??;

    Ok(Json(Paginated {
        items,
        total,
        page: page.page,
        limit: page.limit(),
    }))
}

/// Persist a message, then fan the authoritative record out to the
/// conversation's broadcast group. Broadcast strictly follows a durable
/// write; a failed send is never published.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let message = tokio::task::spawn_blocking(move || {
        db.send_message(
            conversation_id,
            claims.sub,
            &req.content,
            req.message_type,
            &req.files,
        )
    })
    .await??;

    let delivered = state
        .registry
        .publish(
            conversation_id,
            &GatewayEvent::NewMessage {
                message: message.clone(),
            },
        )
        .await;
    debug!(
        "message {} fanned out to {} subscribers",
        message.id, delivered
    );

    Ok((StatusCode::CREATED, Json(message)))
}
