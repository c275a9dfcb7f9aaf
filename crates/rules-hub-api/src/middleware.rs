use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};

use rules_hub_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;

/// Extract and validate the bearer token, then confirm the account still exists.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let claims =
        decode_token(&state.config.jwt_secret, bearer.token()).ok_or(ApiError::Unauthorized)?;

    // Deleted accounts keep valid signatures until expiry
    let id = claims.sub.to_string();
    if run_db(&state, move |db| db.get_user_by_id(&id)).await?.is_none() {
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Verify signature and expiry; `None` for any invalid token.
pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}
