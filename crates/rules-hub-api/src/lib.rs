pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod fanout;
pub mod follows;
pub mod middleware;
pub mod notifications;
pub mod profiles;
pub mod routes;
pub mod rules;
pub mod stats;
pub mod validation;
mod views;

use axum::Json;
use tracing::error;

use rules_hub_db::{Database, unique_violation};
use rules_hub_types::api::ApiResponse;

pub use auth::{AppState, AppStateInner};
pub use config::HubConfig;
pub use error::ApiError;
pub use routes::create_router;

/// Run blocking work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.to_string())
    })
}

/// Run a store call off the async runtime, mapping store failures to 500.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    blocking(move || f(&state.db)).await?.map_err(ApiError::from)
}

/// Same as [`run_db`], except a UNIQUE violation becomes whatever `on_conflict`
/// makes of the offending `table.column`.
pub(crate) async fn run_db_unique<F, T, C>(
    state: &AppState,
    f: F,
    on_conflict: C,
) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
    C: FnOnce(&str) -> ApiError,
{
    let state = state.clone();
    blocking(move || f(&state.db))
        .await?
        .map_err(|e| match unique_violation(&e) {
            Some(column) => on_conflict(&column),
            None => ApiError::from(e),
        })
}

pub(crate) fn ok<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok(data))
}
