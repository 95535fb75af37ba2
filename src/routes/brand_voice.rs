use axum::extract::State;
use axum::response::Json;
use axum::Extension;

use crate::error::AppError;
use crate::middleware::api_auth::AuthedAccount;
use crate::pipeline::brand_voice::{self, BrandVoiceProfile};
use crate::pipeline::prompts::BrandVoiceInput;
use crate::services::gateway::AccountGateway;
use crate::state::AppState;

/// POST /api/brand-voice
pub async fn analyze(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    Json(input): Json<BrandVoiceInput>,
) -> Result<Json<BrandVoiceProfile>, AppError> {
    let gateway = AccountGateway::new(&state.gateway, &account);
    let profile = brand_voice::analyze(&state.db, &gateway, &account, &input, &state.config.default_model).await?;
    Ok(Json(profile))
}
