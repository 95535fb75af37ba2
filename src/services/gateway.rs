//! Metered, quota-enforcing front door to the LLM provider.
//!
//! One call runs: authorize -> count quota windows -> forward -> price ->
//! record usage. Usage recording is best effort and can never fail the call.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{self, queries};
use crate::pipeline::cost::{PricingTable, TokenUsage};
use crate::pipeline::quota::{self, QuotaWindow, RateLimitTable, WindowCounts};
use crate::services::claude::{LlmProvider, MessagesPayload};
use crate::state::Db;

pub use crate::db::queries::Account;

/// Labels attached to the usage record of a call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogContext {
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub generation_id: Option<String>,
}

impl LogContext {
    pub fn operation(operation: &str) -> Self {
        Self {
            operation: Some(operation.to_string()),
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn with_generation(mut self, generation_id: &str) -> Self {
        self.generation_id = Some(generation_id.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_creation_input_tokens: i64,
    pub cache_read_input_tokens: i64,
    pub request_time_ms: i64,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOutput {
    pub text: String,
    pub usage: UsageReport,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Rate limit check unavailable")]
    RateLimitCheckUnavailable,
    #[error("Rate limit exceeded ({0})")]
    RateLimitExceeded(QuotaWindow),
    #[error("{0}")]
    Provider(String),
}

/// A usage record could not be written.
#[derive(Debug, thiserror::Error)]
#[error("failed to record usage: {0}")]
pub struct LogError(String);

pub struct AiGateway {
    db: Db,
    provider: Arc<dyn LlmProvider>,
    pricing: PricingTable,
    limits: RateLimitTable,
}

impl AiGateway {
    pub fn new(db: Db, provider: Arc<dyn LlmProvider>, pricing: PricingTable, limits: RateLimitTable) -> Self {
        Self {
            db,
            provider,
            pricing,
            limits,
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Resolve a bearer token to the caller's account.
    pub async fn authorize(&self, token: &str) -> Result<Account, GatewayError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GatewayError::Unauthorized);
        }
        let conn = self.db.lock().await;
        let user_id = queries::resolve_session(&conn, token, &db::now_timestamp())
            .map_err(|e| {
                tracing::error!(error = %e, "session lookup failed");
                GatewayError::Unauthorized
            })?
            .ok_or(GatewayError::Unauthorized)?;
        queries::get_account_for_user(&conn, &user_id)
            .map_err(|e| {
                tracing::error!(error = %e, "account lookup failed");
                GatewayError::Unauthorized
            })?
            .ok_or(GatewayError::Unauthorized)
    }

    async fn count_since(&self, account_id: &str, since: DateTime<Utc>) -> anyhow::Result<i64> {
        let conn = self.db.lock().await;
        queries::count_usage_since(&conn, account_id, &db::timestamp(since))
    }

    /// Both rolling-window counts, fetched together.
    pub async fn window_counts(&self, account_id: &str, now: DateTime<Utc>) -> Result<WindowCounts, GatewayError> {
        let (minute, day) = tokio::join!(
            self.count_since(account_id, QuotaWindow::Minute.since(now)),
            self.count_since(account_id, QuotaWindow::Day.since(now)),
        );
        match (minute, day) {
            (Ok(last_minute), Ok(last_day)) => Ok(WindowCounts { last_minute, last_day }),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, account_id, "rate limit window count failed");
                Err(GatewayError::RateLimitCheckUnavailable)
            }
        }
    }

    /// Authorize the bearer token, then run the call for its account.
    pub async fn call(
        &self,
        token: &str,
        payload: MessagesPayload,
        context: LogContext,
    ) -> Result<GatewayOutput, GatewayError> {
        let account = self.authorize(token).await?;
        self.call_as(&account, payload, context).await
    }

    /// Quota check, forward, price and record for an already-resolved account.
    pub async fn call_as(
        &self,
        account: &Account,
        payload: MessagesPayload,
        context: LogContext,
    ) -> Result<GatewayOutput, GatewayError> {
        let limits = self.limits.limits_for(account.plan_tier);
        let counts = self.window_counts(&account.id, Utc::now()).await?;
        if let Err(window) = quota::check(limits, counts) {
            tracing::info!(account_id = %account.id, plan = %account.plan_tier, %window, "rate limit exceeded");
            return Err(GatewayError::RateLimitExceeded(window));
        }

        let started = Instant::now();
        let result = self.provider.send(&payload).await;
        let request_time_ms = started.elapsed().as_millis() as i64;

        match result {
            Err(failure) => {
                let record = self.usage_record(account, &payload.model, &context, TokenUsage::default(), 0.0, request_time_ms, Some(failure.message.clone()));
                if let Err(e) = self.record_usage(&record).await {
                    tracing::warn!(error = %e, "dropping usage record for failed call");
                }
                tracing::warn!(account_id = %account.id, model = %payload.model, error = %failure.message, "provider call failed");
                Err(GatewayError::Provider(failure.message))
            }
            Ok(reply) => {
                let estimated_cost = self.pricing.cost(&reply.usage, &payload.model);
                let record = self.usage_record(account, &payload.model, &context, reply.usage, estimated_cost, request_time_ms, None);
                if let Err(e) = self.record_usage(&record).await {
                    tracing::warn!(error = %e, "dropping usage record for successful call");
                }
                tracing::debug!(
                    account_id = %account.id,
                    model = %payload.model,
                    request_time_ms,
                    estimated_cost,
                    "provider call succeeded"
                );
                Ok(GatewayOutput {
                    text: reply.text,
                    usage: UsageReport {
                        model: payload.model,
                        input_tokens: reply.usage.input_tokens,
                        output_tokens: reply.usage.output_tokens,
                        cache_creation_input_tokens: reply.usage.cache_creation_input_tokens,
                        cache_read_input_tokens: reply.usage.cache_read_input_tokens,
                        request_time_ms,
                        estimated_cost,
                    },
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn usage_record(
        &self,
        account: &Account,
        model: &str,
        context: &LogContext,
        usage: TokenUsage,
        estimated_cost: f64,
        request_time_ms: i64,
        error_message: Option<String>,
    ) -> queries::UsageRecord {
        queries::UsageRecord {
            account_id: account.id.clone(),
            generation_id: context.generation_id.clone(),
            model: model.to_string(),
            operation: context.operation.clone().unwrap_or_else(|| "unknown".into()),
            content_type: context.content_type.clone(),
            usage,
            estimated_cost,
            request_time_ms,
            status: if error_message.is_some() {
                queries::UsageStatus::Error
            } else {
                queries::UsageStatus::Success
            },
            error_message,
            created_at: db::now_timestamp(),
        }
    }

    async fn record_usage(&self, record: &queries::UsageRecord) -> Result<(), LogError> {
        let conn = self.db.lock().await;
        queries::insert_usage_log(&conn, record).map_err(|e| LogError(e.to_string()))
    }
}

/// What the generation pipeline needs from the gateway.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, payload: MessagesPayload, context: LogContext) -> Result<GatewayOutput, GatewayError>;
}

/// The gateway bound to one authorized account.
pub struct AccountGateway<'a> {
    gateway: &'a AiGateway,
    account: &'a Account,
}

impl<'a> AccountGateway<'a> {
    pub fn new(gateway: &'a AiGateway, account: &'a Account) -> Self {
        Self { gateway, account }
    }
}

#[async_trait]
impl CompletionGateway for AccountGateway<'_> {
    async fn complete(&self, payload: MessagesPayload, context: LogContext) -> Result<GatewayOutput, GatewayError> {
        self.gateway.call_as(self.account, payload, context).await
    }
}
