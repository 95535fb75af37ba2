use serde::Serialize;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::db::queries::{Account, ContentArtifact};
use crate::models::content::{ContentMetadata, ContentType};
use crate::pipeline::prompts;
use crate::services::claude::MessagesPayload;
use crate::services::gateway::{CompletionGateway, GatewayError, LogContext, UsageReport};
use crate::state::Db;

pub const REVISION_MAX_TOKENS: u32 = 2000;
pub const REVISION_OPERATION: &str = "content_revision";

#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error("Content not found")]
    NotFound,
    #[error("Revision text must not be empty")]
    EmptyText,
    #[error("Metadata does not apply to {0} content")]
    MetadataMismatch(ContentType),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct PolishOutcome {
    pub original: ContentArtifact,
    pub revision: ContentArtifact,
    pub usage: UsageReport,
}

/// Next revision of `original`: same lineage, same type, number + 1.
/// Metadata carries over unless replaced.
pub fn next_revision(
    original: &ContentArtifact,
    text: &str,
    metadata: Option<ContentMetadata>,
    id: String,
    created_at: String,
) -> ContentArtifact {
    ContentArtifact {
        id,
        generation_id: original.generation_id.clone(),
        content_source_id: original.content_source_id.clone(),
        account_id: original.account_id.clone(),
        content_type: original.content_type,
        content_text: text.to_string(),
        content_metadata: metadata.unwrap_or_else(|| original.content_metadata.clone()),
        revision_of: Some(original.lineage_root().to_string()),
        revision_number: original.revision_number + 1,
        is_archived: false,
        archived_at: None,
        created_at,
    }
}

/// Artifact by id, hidden when it belongs to another account.
pub async fn load_owned(db: &Db, account: &Account, id: &str) -> Result<ContentArtifact, RevisionError> {
    let conn = db.lock().await;
    queries::get_generated_content(&conn, id)?
        .filter(|a| a.account_id == account.id)
        .ok_or(RevisionError::NotFound)
}

/// Store `text` as a new revision of artifact `id`.
pub async fn revise(
    db: &Db,
    account: &Account,
    id: &str,
    text: &str,
    metadata: Option<ContentMetadata>,
) -> Result<ContentArtifact, RevisionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RevisionError::EmptyText);
    }
    let original = load_owned(db, account, id).await?;
    if let Some(metadata) = &metadata {
        if !metadata.fits(original.content_type) {
            return Err(RevisionError::MetadataMismatch(original.content_type));
        }
    }
    let draft = next_revision(&original, text, metadata, Uuid::new_v4().to_string(), db::now_timestamp());

    let conn = db.lock().await;
    let stored = queries::insert_revision(&conn, &draft)?;
    tracing::info!(
        artifact_id = %stored.id,
        revision_of = stored.revision_of.as_deref().unwrap_or_default(),
        revision_number = stored.revision_number,
        "revision stored"
    );
    Ok(stored)
}

/// AI polish: ask the model for a light-touch edit, store it as a revision.
pub async fn polish(
    db: &Db,
    gateway: &dyn CompletionGateway,
    account: &Account,
    id: &str,
    guidance: Option<&str>,
    model: &str,
) -> Result<PolishOutcome, RevisionError> {
    let original = load_owned(db, account, id).await?;
    let brand_voice = account.brand_voice_profile.as_deref().unwrap_or_default();
    let prompt = prompts::revise(original.content_type, brand_voice, guidance, &original.content_text);
    let payload = MessagesPayload::cached(model, REVISION_MAX_TOKENS, prompt.system, prompt.user);
    let context = LogContext::operation(REVISION_OPERATION).with_content_type(original.content_type.as_str());

    let output = gateway.complete(payload, context).await?;
    if output.text.trim().is_empty() {
        tracing::warn!(artifact_id = %original.id, "model returned an empty revision");
        return Err(GatewayError::Provider("Model returned an empty revision".into()).into());
    }
    let revision = revise(db, account, &original.id, &output.text, None).await?;

    Ok(PolishOutcome {
        original,
        revision,
        usage: output.usage,
    })
}

/// Every revision in the lineage of artifact `id`, oldest first.
pub async fn lineage(db: &Db, account: &Account, id: &str) -> Result<Vec<ContentArtifact>, RevisionError> {
    let artifact = load_owned(db, account, id).await?;
    let conn = db.lock().await;
    Ok(queries::list_lineage(&conn, artifact.lineage_root())?)
}

/// The revision-0 artifact of `id`'s lineage.
pub async fn original(db: &Db, account: &Account, id: &str) -> Result<ContentArtifact, RevisionError> {
    let artifact = load_owned(db, account, id).await?;
    if artifact.revision_of.is_none() {
        return Ok(artifact);
    }
    load_owned(db, account, artifact.lineage_root()).await
}
