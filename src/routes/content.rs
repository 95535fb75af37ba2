use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::Extension;

use crate::db::{self, queries};
use crate::db::queries::{ContentArtifact, HistoryFilter};
use crate::error::AppError;
use crate::middleware::api_auth::AuthedAccount;
use crate::models::{
    ArchiveResponse, BulkArchiveRequest, ContentHistoryQuery, LineageResponse, ManualRevisionRequest, PolishRequest,
};
use crate::pipeline::revision::{self, PolishOutcome};
use crate::services::gateway::AccountGateway;
use crate::state::AppState;

/// GET /api/content: content history across every source.
pub async fn list_content(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    Query(query): Query<ContentHistoryQuery>,
) -> Result<Json<Vec<ContentArtifact>>, AppError> {
    let filter = HistoryFilter {
        content_type: query.content_type,
        archived: query.archived.unwrap_or(false),
        limit: query.limit.map(|l| l.clamp(1, 500)),
    };
    let conn = state.db.lock().await;
    Ok(Json(queries::list_content_history(&conn, &account.id, &filter)?))
}

/// GET /api/content/{id}/revisions
pub async fn list_revisions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
) -> Result<Json<LineageResponse>, AppError> {
    let original = revision::original(&state.db, &account, &id).await?;
    let revisions = revision::lineage(&state.db, &account, &original.id).await?;
    Ok(Json(LineageResponse { original, revisions }))
}

/// POST /api/content/{id}/revisions: manual edit.
pub async fn create_revision(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    Json(req): Json<ManualRevisionRequest>,
) -> Result<Json<ContentArtifact>, AppError> {
    let stored = revision::revise(&state.db, &account, &id, &req.text, req.metadata).await?;
    Ok(Json(stored))
}

/// POST /api/content/{id}/polish: AI revision.
pub async fn polish(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    body: Bytes,
) -> Result<Json<PolishOutcome>, AppError> {
    // An empty body means no guidance.
    let req: PolishRequest = if body.is_empty() {
        PolishRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?
    };
    let gateway = AccountGateway::new(&state.gateway, &account);
    let outcome = revision::polish(
        &state.db,
        &gateway,
        &account,
        &id,
        req.guidance.as_deref(),
        &state.config.default_model,
    )
    .await?;
    Ok(Json(outcome))
}

async fn set_archived(
    state: &AppState,
    account: &queries::Account,
    id: &str,
    archived: bool,
) -> Result<ArchiveResponse, AppError> {
    let artifact = revision::load_owned(&state.db, account, id).await?;
    let at = archived.then(db::now_timestamp);
    let conn = state.db.lock().await;
    let changed = queries::set_archived(&conn, &artifact.id, at.as_deref())?;
    Ok(ArchiveResponse {
        archived: usize::from(changed),
    })
}

/// POST /api/content/{id}/archive
pub async fn archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
) -> Result<Json<ArchiveResponse>, AppError> {
    Ok(Json(set_archived(&state, &account, &id, true).await?))
}

/// POST /api/content/{id}/unarchive
pub async fn unarchive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
) -> Result<Json<ArchiveResponse>, AppError> {
    Ok(Json(set_archived(&state, &account, &id, false).await?))
}

/// POST /api/content/archive: ids of other accounts are ignored.
pub async fn bulk_archive(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    Json(req): Json<BulkArchiveRequest>,
) -> Result<Json<ArchiveResponse>, AppError> {
    if req.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".into()));
    }
    let conn = state.db.lock().await;
    let archived = queries::archive_many(&conn, &account.id, &req.ids, &db::now_timestamp())?;
    Ok(Json(ArchiveResponse { archived }))
}
