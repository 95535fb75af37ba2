use axum::extract::{Path, State};
use axum::response::Json;
use axum::Extension;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::db::queries::ContentSource;
use crate::error::AppError;
use crate::middleware::api_auth::AuthedAccount;
use crate::models::{CreateSourceRequest, SourceDetail};
use crate::services::extractor;
use crate::state::AppState;

/// POST /api/sources
pub async fn create_source(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
    Json(req): Json<CreateSourceRequest>,
) -> Result<Json<ContentSource>, AppError> {
    let text = match (&req.text, &req.filename, &req.content) {
        (Some(text), _, _) => text.clone(),
        (None, Some(name), Some(content)) => {
            extractor::extract(name, req.mime_type.as_deref(), content.as_bytes())?
        }
        _ => {
            return Err(AppError::BadRequest(
                "provide `text`, or `filename` with `content`".into(),
            ))
        }
    };
    if text.trim().is_empty() {
        return Err(AppError::BadRequest("source text is empty".into()));
    }

    let source = ContentSource {
        id: Uuid::new_v4().to_string(),
        account_id: account.id.clone(),
        title: req
            .title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| req.filename.clone()),
        file_name: req.filename,
        source_text: text,
        created_at: db::now_timestamp(),
    };

    let conn = state.db.lock().await;
    queries::insert_content_source(&conn, &source)?;
    tracing::info!(source_id = %source.id, chars = source.source_text.len(), "source created");
    Ok(Json(source))
}

/// Source by id when owned by `account_id`.
pub(crate) fn owned_source(
    conn: &rusqlite::Connection,
    account_id: &str,
    id: &str,
) -> Result<ContentSource, AppError> {
    queries::get_content_source(conn, id)?
        .filter(|s| s.account_id == account_id)
        .ok_or_else(|| AppError::NotFound("source".into()))
}

/// GET /api/sources/{id}: source with its live content.
pub async fn get_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
) -> Result<Json<SourceDetail>, AppError> {
    let conn = state.db.lock().await;
    let source = owned_source(&conn, &account.id, &id)?;
    let content = queries::list_content_by_source(&conn, &source.id)?;
    let existing_types = queries::existing_content_types(&conn, &source.id)?;
    Ok(Json(SourceDetail {
        source,
        content,
        existing_types,
    }))
}

/// GET /api/sources
pub async fn list_sources(
    State(state): State<AppState>,
    Extension(AuthedAccount(account)): Extension<AuthedAccount>,
) -> Result<Json<Vec<ContentSource>>, AppError> {
    let conn = state.db.lock().await;
    Ok(Json(queries::list_content_sources(&conn, &account.id)?))
}
