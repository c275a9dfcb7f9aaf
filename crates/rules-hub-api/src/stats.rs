use axum::{extract::State, response::IntoResponse};

use rules_hub_types::models::{CategoryCount, Stats};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{ok, run_db};

/// GET /stats: public aggregates over owned rules.
pub async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, |db| db.stats()).await?;

    Ok(ok(Stats {
        total_rules: row.total_rules,
        total_users: row.total_users,
        total_downloads: row.total_downloads,
        total_likes: row.total_likes,
        categories: row
            .categories
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect(),
    }))
}
