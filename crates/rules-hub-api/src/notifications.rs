use axum::{Extension, extract::State, response::IntoResponse};
use serde::Deserialize;
use uuid::Uuid;

use rules_hub_types::api::{Claims, DeletedCount, UnreadCount, UpdatedCount};
use rules_hub_types::models::Notification;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiPath, ApiQuery};
use crate::{ok, run_db, views};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_notifications(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<NotificationQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let limit = query.limit.clamp(1, 200);
    let unread_only = query.unread_only;

    let rows = run_db(&state, move |db| db.list_notifications(&id, unread_only, limit)).await?;
    let notifications: Vec<Notification> = rows.into_iter().map(views::notification).collect();
    Ok(ok(notifications))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let count = run_db(&state, move |db| db.unread_count(&id)).await?;
    Ok(ok(UnreadCount { count }))
}

/// Only the caller's own notification is touched.
pub async fn mark_read(
    State(state): State<AppState>,
    ApiPath(notification_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (id, user) = (notification_id.to_string(), claims.sub.to_string());
    let updated = run_db(&state, move |db| db.mark_read(&id, &user)).await?;
    if updated == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(ok(UpdatedCount { updated }))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = claims.sub.to_string();
    let updated = run_db(&state, move |db| db.mark_all_read(&user)).await?;
    Ok(ok(UpdatedCount { updated }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    ApiPath(notification_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (id, user) = (notification_id.to_string(), claims.sub.to_string());
    let deleted = run_db(&state, move |db| db.delete_notification(&id, &user)).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(ok(DeletedCount { deleted }))
}
