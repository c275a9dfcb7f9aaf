//! User-admin API. Every handler re-reads the caller's role from the store.

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::info;
use uuid::Uuid;

use rules_hub_types::api::{
    Claims, DeletedCount, InviteUserRequest, InviteUserResponse, RoleChanged, UpdateRoleRequest,
};
use rules_hub_types::models::{AdminUser, Role};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::validation::normalize_email;
use crate::{ok, run_db, run_db_unique, views};

const INVITE_TOKEN_LEN: usize = 32;
const EMAIL_TAKEN: &str = "A user with this email already exists";

async fn require_admin(state: &AppState, claims: &Claims) -> Result<(), ApiError> {
    let id = claims.sub.to_string();
    let user = run_db(state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if views::parse_role(&user.role) != Role::Admin {
        return Err(ApiError::Forbidden("Admin access required".into()));
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &claims).await?;

    let rows = run_db(&state, |db| db.list_users()).await?;
    let users: Vec<AdminUser> = rows.into_iter().map(views::admin_user).collect();
    Ok(ok(users))
}

/// POST /admin/users/invite: creates a pending account; duplicates are reported, not merged.
pub async fn invite_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<InviteUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &claims).await?;

    let email = normalize_email(&req.email)?;
    let lookup = email.clone();
    if run_db(&state, move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
    }

    let user_id = Uuid::new_v4();
    let invite_token = generate_invite_token();
    let role = req.role;

    let (id, e, t) = (user_id.to_string(), email.clone(), invite_token.clone());
    run_db_unique(
        &state,
        move |db| db.create_invited_user(&id, &e, role.as_str(), &t),
        |_| ApiError::Conflict(EMAIL_TAKEN.into()),
    )
    .await?;

    info!("{} invited {} as {}", claims.email, email, role);

    Ok((
        StatusCode::CREATED,
        ok(InviteUserResponse {
            user_id,
            email,
            role,
            invite_token,
        }),
    ))
}

pub async fn update_role(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &claims).await?;

    if user_id == claims.sub && req.role != Role::Admin {
        return Err(ApiError::bad_request("You cannot remove your own admin role"));
    }

    let role = req.role;
    let id = user_id.to_string();
    let updated = run_db(&state, move |db| db.update_user_role(&id, role.as_str())).await?;
    if updated == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    info!("{} set role of {} to {}", claims.email, user_id, role);
    Ok(ok(RoleChanged { user_id, role }))
}

/// Profiles, follows and notifications go with the account; its rules become orphans.
pub async fn delete_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &claims).await?;

    if user_id == claims.sub {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let id = user_id.to_string();
    let deleted = run_db(&state, move |db| db.delete_user(&id)).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    info!("{} deleted user {}", claims.email, user_id);
    Ok(ok(DeletedCount { deleted }))
}

pub async fn delete_orphaned_rules(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &claims).await?;

    let deleted = run_db(&state, |db| db.delete_orphaned_rules()).await?;
    info!("{} removed {} orphaned rules", claims.email, deleted);
    Ok(ok(DeletedCount { deleted }))
}

fn generate_invite_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_tokens_are_alphanumeric_and_distinct() {
        let a = generate_invite_token();
        let b = generate_invite_token();
        assert_eq!(a.len(), INVITE_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
