use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use rules_hub_types::api::{Claims, FollowStatus};
use rules_hub_types::models::ProfileSummary;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::ApiPath;
use crate::{fanout, ok, run_db, views};

pub async fn follow_user(
    State(state): State<AppState>,
    ApiPath(target): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if target == claims.sub {
        return Err(ApiError::bad_request("You cannot follow yourself"));
    }

    let (me, them) = (claims.sub.to_string(), target.to_string());
    let outcome = run_db(&state, move |db| {
        if db.get_user_by_id(&them)?.is_none() {
            return Ok(None);
        }
        let created = db.follow(&me, &them)?;
        let username = db.get_profile_by_user_id(&me)?.map(|p| p.username);
        Ok(Some((created, username)))
    })
    .await?;

    let (created, username) = outcome.ok_or_else(|| ApiError::not_found("User not found"))?;
    if created {
        info!("{} followed {}", claims.sub, target);
        let username = username.unwrap_or_else(|| claims.email.clone());
        fanout::notify_new_follower(&state, claims.sub, username, target).await;
    }

    Ok(ok(FollowStatus { following: true }))
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    ApiPath(target): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (me, them) = (claims.sub.to_string(), target.to_string());
    run_db(&state, move |db| db.unfollow(&me, &them)).await?;
    Ok(ok(FollowStatus { following: false }))
}

pub async fn follow_status(
    State(state): State<AppState>,
    ApiPath(target): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (me, them) = (claims.sub.to_string(), target.to_string());
    let following = run_db(&state, move |db| db.is_following(&me, &them)).await?;
    Ok(ok(FollowStatus { following }))
}

pub async fn list_followers(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = user_id.to_string();
    let rows = run_db(&state, move |db| db.list_followers(&id)).await?;
    let followers: Vec<ProfileSummary> = rows.into_iter().map(views::summary).collect();
    Ok(ok(followers))
}

pub async fn list_following(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = user_id.to_string();
    let rows = run_db(&state, move |db| db.list_following(&id)).await?;
    let following: Vec<ProfileSummary> = rows.into_iter().map(views::summary).collect();
    Ok(ok(following))
}
