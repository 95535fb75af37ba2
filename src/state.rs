use crate::config::Config;
use crate::pipeline::cost::PricingTable;
use crate::pipeline::quota::RateLimitTable;
use crate::services::claude::{ClaudeClient, LlmProvider};
use crate::services::gateway::AiGateway;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type Db = Arc<Mutex<Connection>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<Config>,
    pub gateway: Arc<AiGateway>,
}

impl AppState {
    /// State backed by the real provider client from `config`.
    pub fn new(conn: Connection, config: Config) -> Self {
        let provider: Arc<dyn LlmProvider> = Arc::new(ClaudeClient::new(
            &config.anthropic_base_url,
            &config.anthropic_api_key,
        ));
        Self::with_provider(conn, config, provider, PricingTable::default(), RateLimitTable::default())
    }

    pub fn with_provider(
        conn: Connection,
        config: Config,
        provider: Arc<dyn LlmProvider>,
        pricing: PricingTable,
        limits: RateLimitTable,
    ) -> Self {
        let db: Db = Arc::new(Mutex::new(conn));
        let gateway = AiGateway::new(db.clone(), provider, pricing, limits);
        Self {
            db,
            config: Arc::new(config),
            gateway: Arc::new(gateway),
        }
    }
}
