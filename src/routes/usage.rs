use axum::extract::State;
use axum::response::Json;
use axum::Extension;
use chrono::Utc;

use crate::db::{self, queries};
use crate::error::AppError;
use crate::middleware::api_auth::AuthedAccount;
use crate::models::UsageResponse;
use crate::pipeline::quota;
use crate::state::AppState;

/// GET /api/usage: this calendar month so far.
pub async fn monthly_usage(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
) -> Result<Json<UsageResponse>, AppError> {
    let since = db::timestamp(quota::month_start(Utc::now()));
    let conn = state.db.lock().await;
    let stats = queries::usage_stats_since(&conn, &account.id, &since)?;
    let generations_used = queries::count_completed_generations_since(&conn, &account.id, &since)?;

    Ok(Json(UsageResponse {
        since,
        plan_tier: account.plan_tier,
        generations_used,
        generations_allowed: account.plan_tier.monthly_generations(),
        stats,
    }))
}
