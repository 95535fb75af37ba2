pub mod content;

use serde::{Deserialize, Serialize};

use crate::db::queries::{ContentArtifact, ContentSource, Generation, UsageStats};
use crate::models::content::{ContentMetadata, ContentType, ToneOverride};
use crate::pipeline::prompts::GenerationOptions;
use crate::pipeline::quota::PlanTier;
use crate::services::claude::MessagesPayload;
use crate::services::gateway::LogContext;

// --- Gateway ---
#[derive(Debug, Deserialize)]
pub struct GatewayRequest {
    pub payload: MessagesPayload,
    #[serde(default, rename = "logContext")]
    pub log_context: LogContext,
}

// --- Sources ---
/// Either raw `text`, or an uploaded transcript as `filename` + `content`.
#[derive(Debug, Deserialize)]
pub struct CreateSourceRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SourceDetail {
    pub source: ContentSource,
    pub content: Vec<ContentArtifact>,
    /// Types generated for this source so far, archived content included.
    pub existing_types: Vec<ContentType>,
}

// --- Generations ---
#[derive(Debug, Deserialize)]
pub struct CreateGenerationRequest {
    pub source_id: String,
    pub content_types: Vec<ContentType>,
    #[serde(default)]
    pub tone: Option<ToneOverride>,
    #[serde(default)]
    pub options: GenerationOptions,
}

#[derive(Debug, Serialize)]
pub struct GenerationDetail {
    pub generation: Generation,
    pub artifacts: Vec<ContentArtifact>,
}

// --- Content ---
#[derive(Debug, Deserialize)]
pub struct ManualRevisionRequest {
    pub text: String,
    #[serde(default)]
    pub metadata: Option<ContentMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PolishRequest {
    #[serde(default)]
    pub guidance: Option<String>,
}

/// Filters for GET /api/content; live content unless `archived=true`.
#[derive(Debug, Default, Deserialize)]
pub struct ContentHistoryQuery {
    #[serde(default)]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub archived: Option<bool>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LineageResponse {
    pub original: ContentArtifact,
    pub revisions: Vec<ContentArtifact>,
}

#[derive(Debug, Deserialize)]
pub struct BulkArchiveRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveResponse {
    pub archived: usize,
}

// --- Usage ---
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub since: String,
    pub plan_tier: PlanTier,
    pub generations_used: i64,
    pub generations_allowed: i64,
    pub stats: UsageStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
}
