use serde::Serialize;

use crate::db::queries::{self, Account};
use crate::pipeline::prompts::{self, BrandVoiceInput};
use crate::services::claude::MessagesPayload;
use crate::services::gateway::{CompletionGateway, GatewayError, LogContext, UsageReport};
use crate::state::Db;

pub const BRAND_VOICE_OPERATION: &str = "brand_voice_analysis";

#[derive(Debug, thiserror::Error)]
pub enum BrandVoiceError {
    #[error("Provide writing examples, a style guide, or both")]
    NothingToAnalyze,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct BrandVoiceProfile {
    pub profile: String,
    pub usage: UsageReport,
}

/// Derive a brand-voice profile and store it on the account.
pub async fn analyze(
    db: &Db,
    gateway: &dyn CompletionGateway,
    account: &Account,
    input: &BrandVoiceInput,
    model: &str,
) -> Result<BrandVoiceProfile, BrandVoiceError> {
    let built = prompts::brand_voice(input).ok_or(BrandVoiceError::NothingToAnalyze)?;
    let payload = MessagesPayload::plain(model, built.max_tokens, built.prompt.system, built.prompt.user);

    let output = gateway
        .complete(payload, LogContext::operation(BRAND_VOICE_OPERATION))
        .await?;
    let profile = output.text.trim().to_string();

    {
        let conn = db.lock().await;
        queries::update_brand_voice(
            &conn,
            &account.id,
            &profile,
            input.target_audience.as_deref().filter(|s| !s.trim().is_empty()),
            input.words_to_avoid.as_deref().filter(|s| !s.trim().is_empty()),
        )?;
    }
    tracing::info!(account_id = %account.id, chars = profile.len(), "brand voice profile updated");

    Ok(BrandVoiceProfile {
        profile,
        usage: output.usage,
    })
}
