use axum::extract::{DefaultBodyLimit, Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router, middleware};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use courier_api::error::ApiError;
use courier_api::middleware::{decode_token, require_auth};
use courier_api::state::AppState;
use courier_api::{conversations, messages, uploads};
use courier_gateway::connection;

/// Generous request cap for multipart uploads (10 files x 10 MB plus
/// encoding overhead). Individual file limits are enforced in the handler.
const UPLOAD_BODY_LIMIT: usize = 110 * 1024 * 1024;

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route("/conversations/{id}", get(conversations::get_conversation))
        .route(
            "/conversations/{id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/conversations/{id}/read", put(conversations::mark_read))
        .route(
            "/conversations/{id}/upload-files",
            post(uploads::upload_files).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/files/{id}", get(uploads::download_file))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct WsAuthQuery {
    token: Option<String>,
}

/// Authenticate the WebSocket handshake before upgrading. A missing or
/// invalid token refuses the connection outright; there is no in-band
/// identify step afterwards.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let token = query
        .token
        .or(header_token)
        .ok_or(ApiError::Unauthorized)?;
    let claims = decode_token(&state.jwt_secret, &token)?;

    let registry = state.registry.clone();
    let db = state.db.clone();
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, registry, db, claims.sub)))
}
