use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::db::queries::{Account, ContentArtifact, ContentSource, Generation, GenerationStatus};
use crate::models::content::{ContentMetadata, ContentType, ToneOverride};
use crate::pipeline::parser::{self, ArtifactDraft};
use crate::pipeline::prompts::{self, GenerationOptions, DEFAULT_BRAND_VOICE};
use crate::pipeline::quota;
use crate::services::claude::MessagesPayload;
use crate::services::gateway::{CompletionGateway, LogContext};
use crate::state::Db;

pub const GENERATION_MAX_TOKENS: u32 = 2000;
pub const GENERATION_OPERATION: &str = "content_generation";

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub selected_types: Vec<ContentType>,
    pub tone: Option<ToneOverride>,
    pub options: GenerationOptions,
    pub model: String,
}

/// What happened to one requested content type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeOutcome {
    pub content_type: ContentType,
    pub artifacts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub generation: Generation,
    pub artifacts: Vec<ContentArtifact>,
    pub outcomes: Vec<TypeOutcome>,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Select at least one content type")]
    NoContentTypes,
    #[error("Monthly generation limit reached ({used}/{allowance})")]
    AllowanceExhausted { used: i64, allowance: i64 },
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Request options, with the account's audience and words-to-avoid filling gaps.
fn effective_options(account: &Account, options: &GenerationOptions) -> GenerationOptions {
    GenerationOptions {
        linkedin_length: options.linkedin_length,
        target_audience: options
            .target_audience
            .clone()
            .or_else(|| account.target_audience.clone()),
        words_to_avoid: options
            .words_to_avoid
            .clone()
            .or_else(|| account.words_to_avoid.clone()),
    }
}

fn dedupe(types: &[ContentType]) -> Vec<ContentType> {
    let mut out: Vec<ContentType> = Vec::with_capacity(types.len());
    for t in types {
        if !out.contains(t) {
            out.push(*t);
        }
    }
    out
}

/// Drafts for every requested type, in request order.
///
/// Types run one after another. A failed gateway call skips its type and is
/// reported in the outcome list instead of aborting the run.
pub async fn draft_all(
    gateway: &dyn CompletionGateway,
    generation_id: &str,
    source_text: &str,
    brand_voice: &str,
    request: &GenerationRequest,
    options: &GenerationOptions,
) -> (Vec<(ContentType, ArtifactDraft)>, Vec<TypeOutcome>) {
    let mut drafts = Vec::new();
    let mut outcomes = Vec::with_capacity(request.selected_types.len());

    for &content_type in &request.selected_types {
        let prompt = prompts::build(content_type, source_text, brand_voice, request.tone, options);
        let payload = MessagesPayload::cached(&request.model, GENERATION_MAX_TOKENS, prompt.system, prompt.user);
        let context = LogContext::operation(GENERATION_OPERATION)
            .with_content_type(content_type.as_str())
            .with_generation(generation_id);

        match gateway.complete(payload, context).await {
            Ok(output) => {
                let parsed = parser::parse(content_type, &output.text);
                let count = parsed.len();
                for mut draft in parsed {
                    if content_type == ContentType::LinkedinPost {
                        draft.metadata = ContentMetadata::Social {
                            linkedin_length: options.linkedin_length,
                        };
                    }
                    drafts.push((content_type, draft));
                }
                outcomes.push(TypeOutcome {
                    content_type,
                    artifacts: count,
                    error: None,
                });
            }
            Err(e) => {
                tracing::warn!(generation_id, content_type = %content_type, error = %e, "content type failed, skipping");
                outcomes.push(TypeOutcome {
                    content_type,
                    artifacts: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    (drafts, outcomes)
}

/// Run a full generation for `source` on behalf of `account`.
pub async fn run(
    db: &Db,
    gateway: &dyn CompletionGateway,
    account: &Account,
    source: &ContentSource,
    request: GenerationRequest,
) -> Result<GenerationOutcome, GenerationError> {
    let request = GenerationRequest {
        selected_types: dedupe(&request.selected_types),
        ..request
    };
    if request.selected_types.is_empty() {
        return Err(GenerationError::NoContentTypes);
    }

    let now = Utc::now();
    let mut generation = Generation {
        id: Uuid::new_v4().to_string(),
        content_source_id: source.id.clone(),
        account_id: account.id.clone(),
        selected_types: request.selected_types.clone(),
        tone_override: request.tone,
        status: GenerationStatus::Processing,
        created_at: db::timestamp(now),
        completed_at: None,
    };

    {
        let conn = db.lock().await;
        let allowance = account.plan_tier.monthly_generations();
        let used = queries::count_completed_generations_since(
            &conn,
            &account.id,
            &db::timestamp(quota::month_start(now)),
        )?;
        if used >= allowance {
            return Err(GenerationError::AllowanceExhausted { used, allowance });
        }
        queries::insert_generation(&conn, &generation)?;
    }

    tracing::info!(
        generation_id = %generation.id,
        source_id = %source.id,
        types = request.selected_types.len(),
        "generation started"
    );

    let brand_voice = account
        .brand_voice_profile
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(DEFAULT_BRAND_VOICE);
    let options = effective_options(account, &request.options);

    let (drafts, outcomes) = draft_all(
        gateway,
        &generation.id,
        &source.source_text,
        brand_voice,
        &request,
        &options,
    )
    .await;

    let created_at = db::now_timestamp();
    let artifacts: Vec<ContentArtifact> = drafts
        .into_iter()
        .map(|(content_type, draft)| ContentArtifact {
            id: Uuid::new_v4().to_string(),
            generation_id: generation.id.clone(),
            content_source_id: source.id.clone(),
            account_id: account.id.clone(),
            content_type,
            content_text: draft.text,
            content_metadata: draft.metadata,
            revision_of: None,
            revision_number: 0,
            is_archived: false,
            archived_at: None,
            created_at: created_at.clone(),
        })
        .collect();

    let completed_at = db::now_timestamp();
    {
        let conn = db.lock().await;
        let stored = queries::insert_generated_content(&conn, &artifacts);
        // The run is over either way; never leave it processing.
        queries::complete_generation(&conn, &generation.id, &completed_at)?;
        if let Err(e) = stored {
            tracing::error!(generation_id = %generation.id, error = %e, "artifacts not stored");
            return Err(e.into());
        }
    }
    generation.status = GenerationStatus::Complete;
    generation.completed_at = Some(completed_at);

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    tracing::info!(
        generation_id = %generation.id,
        artifacts = artifacts.len(),
        failed_types = failed,
        "generation complete"
    );

    Ok(GenerationOutcome {
        generation,
        artifacts,
        outcomes,
    })
}
