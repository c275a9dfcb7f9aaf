use axum::{Extension, extract::State, response::IntoResponse};
use serde::Deserialize;
use tracing::warn;

use rules_hub_db::models::ProfileChanges;
use rules_hub_types::api::{Claims, UpdateProfileRequest, UsernameAvailability};

use crate::auth::{AppState, USERNAME_TAKEN};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::validation::{
    MAX_BIO_LEN, MAX_DISPLAY_NAME_LEN, MAX_LINK_LEN, is_valid_username, normalize_username,
    optional_text,
};
use crate::{ok, run_db, run_db_unique, views};

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    #[serde(default)]
    pub username: String,
}

/// GET /profiles/{username}: hidden profiles look the same as missing ones.
pub async fn get_profile(
    State(state): State<AppState>,
    ApiPath(username): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let username = username.trim().to_lowercase();
    let profile = run_db(&state, move |db| db.get_profile_by_username(&username))
        .await?
        .filter(|p| p.is_public)
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(ok(views::profile(profile)))
}

/// GET /profiles/check-username: never fails; lookup errors read as "taken".
pub async fn check_username(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UsernameQuery>,
) -> impl IntoResponse {
    let username = query.username.trim().to_lowercase();

    let available = if !is_valid_username(&username) {
        false
    } else {
        let lookup = username.clone();
        match run_db(&state, move |db| db.username_taken(&lookup, None)).await {
            Ok(taken) => !taken,
            Err(e) => {
                warn!("Username availability check for '{}' failed: {}", username, e);
                false
            }
        }
    };

    ok(UsernameAvailability {
        username,
        available,
    })
}

pub async fn get_my_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let profile = run_db(&state, move |db| db.get_profile_by_user_id(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(ok(views::profile(profile)))
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let lookup = id.clone();
    let current = run_db(&state, move |db| db.get_profile_by_user_id(&lookup))
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    let username = match req.username {
        Some(raw) => normalize_username(&raw)?,
        None => current.username.clone(),
    };
    if username != current.username {
        let (u, me) = (username.clone(), id.clone());
        if run_db(&state, move |db| db.username_taken(&u, Some(&me))).await? {
            return Err(ApiError::Conflict(USERNAME_TAKEN.into()));
        }
    }

    let changes = ProfileChanges {
        username,
        display_name: merge_text(
            "display_name",
            req.display_name,
            current.display_name,
            MAX_DISPLAY_NAME_LEN,
        )?,
        bio: merge_text("bio", req.bio, current.bio, MAX_BIO_LEN)?,
        website: merge_text("website", req.website, current.website, MAX_LINK_LEN)?,
        github: merge_text("github", req.github, current.github, MAX_LINK_LEN)?,
        twitter: merge_text("twitter", req.twitter, current.twitter, MAX_LINK_LEN)?,
        is_public: req.is_public.unwrap_or(current.is_public),
    };

    // Another account may have claimed the name since the check above
    let profile = run_db_unique(
        &state,
        move |db| {
            db.update_profile(&id, &changes)?;
            db.get_profile_by_user_id(&id)
        },
        |_| ApiError::Conflict(USERNAME_TAKEN.into()),
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(ok(views::profile(profile)))
}

/// Absent keeps the current value; blank clears it.
fn merge_text(
    field: &str,
    update: Option<String>,
    current: Option<String>,
    max: usize,
) -> Result<Option<String>, ApiError> {
    match update {
        Some(value) => optional_text(field, Some(&value), max),
        None => Ok(current),
    }
}
