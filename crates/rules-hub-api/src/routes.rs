use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use serde_json::json;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{admin, follows, notifications, profiles, rules, stats};

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the API router.
///
/// Public: health, auth, rule browsing and downloads, profiles, follower
/// lists and stats. Everything else sits behind [`require_auth`].
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/accept-invite", post(auth::accept_invite))
        .route("/rules", get(rules::list_rules))
        .route("/rules/{id}", get(rules::get_rule))
        .route("/rules/{id}/download", post(rules::download_rule))
        .route("/profiles/check-username", get(profiles::check_username))
        .route("/profiles/{username}", get(profiles::get_profile))
        .route("/users/{id}/followers", get(follows::list_followers))
        .route("/users/{id}/following", get(follows::list_following))
        .route("/stats", get(stats::get_stats));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/rules", post(rules::create_rule))
        .route("/rules/{id}", put(rules::update_rule).delete(rules::delete_rule))
        .route("/rules/{id}/like", post(rules::toggle_like))
        .route("/feed", get(rules::feed))
        .route("/me/profile", get(profiles::get_my_profile).put(profiles::update_my_profile))
        .route("/users/{id}/follow", post(follows::follow_user).delete(follows::unfollow_user))
        .route("/users/{id}/follow-status", get(follows::follow_status))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete_notification))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/invite", post(admin::invite_user))
        .route("/admin/users/{id}/role", put(admin::update_role))
        .route("/admin/users/{id}", delete(admin::delete_user))
        .route("/admin/rules/orphaned", delete(admin::delete_orphaned_rules))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
