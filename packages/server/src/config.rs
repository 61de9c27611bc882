use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub enrichment_api_url: String,
    pub enrichment_api_key: String,
    pub scheduler_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            enrichment_api_url: env::var("ENRICHMENT_API_URL")
                .context("ENRICHMENT_API_URL must be set")?,
            enrichment_api_key: env::var("ENRICHMENT_API_KEY")
                .context("ENRICHMENT_API_KEY must be set")?,
            scheduler_enabled: env::var("SCHEDULER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        })
    }
}
