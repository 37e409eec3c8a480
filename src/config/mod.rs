use serde::Deserialize;

use crate::error::Result;

fn default_export_chunk_size() -> i64 {
    1000
}

/// Configuration for the application
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Rows fetched per export chunk; bounds exporter memory.
    #[serde(default = "default_export_chunk_size")]
    pub export_chunk_size: i64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// This function will:
    /// 1. Load variables from .env file if it exists
    /// 2. Deserialize environment variables into Config struct
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = envy::from_env::<Config>()
            .map_err(|e| crate::Error::validation("environment", e.to_string()))?;

        Ok(config)
    }

    /// Get a direct reference to the database URL
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// Initialize environment variables and load configuration
pub fn init() -> Result<Config> {
    Config::load()
}
