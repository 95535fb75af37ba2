use axum::extract::{Path, State};
use axum::response::Json;
use axum::Extension;

use crate::db::queries::{self, Generation};
use crate::error::AppError;
use crate::middleware::api_auth::AuthedAccount;
use crate::models::{CreateGenerationRequest, GenerationDetail};
use crate::pipeline::generation::{self, GenerationOutcome, GenerationRequest};
use crate::routes::sources::owned_source;
use crate::services::gateway::AccountGateway;
use crate::state::AppState;

/// POST /api/generations: runs every requested type before answering.
pub async fn create_generation(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    Json(req): Json<CreateGenerationRequest>,
) -> Result<Json<GenerationOutcome>, AppError> {
    let source = {
        let conn = state.db.lock().await;
        owned_source(&conn, &account.id, &req.source_id)?
    };

    let gateway = AccountGateway::new(&state.gateway, &account);
    let outcome = generation::run(
        &state.db,
        &gateway,
        &account,
        &source,
        GenerationRequest {
            selected_types: req.content_types,
            tone: req.tone,
            options: req.options,
            model: state.config.default_model.clone(),
        },
    )
    .await?;

    Ok(Json(outcome))
}

/// GET /api/generations/{id}
pub async fn get_generation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
) -> Result<Json<GenerationDetail>, AppError> {
    let conn = state.db.lock().await;
    let generation = queries::get_generation(&conn, &id)?
        .filter(|g| g.account_id == account.id)
        .ok_or_else(|| AppError::NotFound("generation".into()))?;
    let artifacts = queries::list_content_by_generation(&conn, &generation.id)?;
    Ok(Json(GenerationDetail {
        generation,
        artifacts,
    }))
}

/// GET /api/generations
pub async fn list_generations(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
) -> Result<Json<Vec<Generation>>, AppError> {
    let conn = state.db.lock().await;
    Ok(Json(queries::list_generations(&conn, &account.id)?))
}
