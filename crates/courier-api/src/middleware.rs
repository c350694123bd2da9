use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use courier_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract and validate the bearer token from the Authorization header and
/// stash the decoded claims in request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let claims = decode_token(&state.jwt_secret, token)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Validate a bearer token. Shared by the REST middleware and the WebSocket
/// upgrade handler; expiry is checked by the default validation.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;
    Ok(token_data.claims)
}

/// Mint a token for a subject id. Issuance belongs to the external identity
/// service; this helper exists for tests and local tooling.
pub fn issue_token(secret: &str, user_id: Uuid) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| ApiError::Internal)
}
