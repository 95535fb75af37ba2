use anyhow::{Context, Result};

use crate::pipeline::cost::DEFAULT_MODEL;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub default_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8890".into())
                .parse()
                .context("PORT must be a number")?,
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/repurpose.db".into()),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            anthropic_base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".into()),
            default_model: std::env::var("DEFAULT_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.into()),
        })
    }

    /// Names of required server credentials that are unset.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.anthropic_api_key.trim().is_empty() {
            missing.push("ANTHROPIC_API_KEY");
        }
        missing
    }
}
