use std::env;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

fn get_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn get_env_u32(key: &str, default: u32) -> Result<u32> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => Ok(v
            .parse::<u32>()
            .map_err(|e| anyhow!("{key} invalid int: {e}"))?),
    }
}

fn get_env_u64(key: &str, default: u64) -> Result<u64> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => Ok(v
            .parse::<u64>()
            .map_err(|e| anyhow!("{key} invalid int: {e}"))?),
    }
}

fn get_env_string(key: &str, default: &str) -> String {
    get_env(key).unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Credentials / endpoint
    pub api_key: String,
    pub base_url: String,

    // Listings query (constants of the original batch job, now overridable)
    pub start: u32,
    pub limit: u32,
    pub convert: String,

    // Harvest loop
    pub cycles: u32,
    pub delay_secs: u64,
    pub output_path: String,

    // HTTP transport
    pub http_timeout_secs: u64,
    pub http_max_retries: u32,
}

impl Settings {
    pub fn load() -> Result<Self> {
        // Missing credential is fatal here, before the first request goes out.
        // The API would otherwise accept the request and reject every cycle.
        let api_key = get_env("CMC_API_KEY")
            .ok_or_else(|| anyhow!("CMC_API_KEY is not set (put it in the environment or .env)"))?;

        let s = Self {
            api_key,
            base_url: get_env_string("CMC_BASE_URL", "https://pro-api.coinmarketcap.com"),
            start: get_env_u32("CMC_START", 1)?,
            limit: get_env_u32("CMC_LIMIT", 15)?,
            convert: get_env_string("CMC_CONVERT", "USD").to_uppercase(),
            cycles: get_env_u32("HARVEST_CYCLES", 36)?,
            delay_secs: get_env_u64("HARVEST_DELAY_SECS", 300)?,
            output_path: get_env_string("HARVEST_OUTPUT", "historical_data.csv"),
            http_timeout_secs: get_env_u64("HTTP_TIMEOUT_SECS", 30)?,
            http_max_retries: get_env_u32("HTTP_MAX_RETRIES", 3)?,
        };

        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(anyhow!("CMC_BASE_URL must not be empty"));
        }
        if self.start < 1 {
            return Err(anyhow!("CMC_START must be >= 1 (got {})", self.start));
        }
        if self.limit < 1 || self.limit > 5000 {
            return Err(anyhow!("CMC_LIMIT must be in 1..=5000 (got {})", self.limit));
        }
        if self.convert.is_empty() {
            return Err(anyhow!("CMC_CONVERT must not be empty"));
        }
        if self.cycles < 1 {
            return Err(anyhow!("HARVEST_CYCLES must be >= 1 (got {})", self.cycles));
        }
        if self.output_path.is_empty() {
            return Err(anyhow!("HARVEST_OUTPUT must not be empty"));
        }
        if self.http_timeout_secs < 1 {
            return Err(anyhow!(
                "HTTP_TIMEOUT_SECS must be >= 1 (got {})",
                self.http_timeout_secs
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings {
        api_key: "test-key".to_string(),
        base_url: "https://pro-api.coinmarketcap.com".to_string(),
        start: 1,
        limit: 15,
        convert: "USD".to_string(),
        cycles: 36,
        delay_secs: 0,
        output_path: "historical_data.csv".to_string(),
        http_timeout_secs: 30,
        http_max_retries: 3,
    }
}
