//! Environment-driven engine configuration

use crate::orchestrator::ResolutionPolicy;
use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_ITERATIONS: u32 = 4;
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gemini_api_key: Option<String>,
    pub financial_api_base_url: Option<String>,
    pub database_url: Option<String>,
    pub port: u16,
    pub max_iterations: u32,
    pub resolution_policy: ResolutionPolicy,
    pub provider_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            financial_api_base_url: None,
            database_url: None,
            port: DEFAULT_PORT,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            resolution_policy: ResolutionPolicy::default(),
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// Load `.env` (if present) and read every setting from the environment.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            gemini_api_key: non_empty_var("GEMINI_API_KEY")
                .filter(|key| key != "your_gemini_api_key_here"),
            financial_api_base_url: non_empty_var("FINANCIAL_API_BASE_URL"),
            database_url: non_empty_var("POSTGRES_URL").or_else(|| non_empty_var("DATABASE_URL")),
            port: parsed_var("PORT")
                .or_else(|| parsed_var("API_PORT"))
                .unwrap_or(DEFAULT_PORT),
            max_iterations: parsed_var("COLLAB_MAX_ITERATIONS").unwrap_or(DEFAULT_MAX_ITERATIONS),
            resolution_policy: parsed_var("COLLAB_RESOLUTION_POLICY").unwrap_or_default(),
            provider_timeout_secs: parsed_var("FINANCIAL_API_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = non_empty_var(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key = key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.resolution_policy, ResolutionPolicy::RiskMitigationFirst);
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_unparsable_value_is_ignored() {
        env::set_var("COLLAB_TEST_PORT_GARBAGE", "not-a-port");
        assert_eq!(parsed_var::<u16>("COLLAB_TEST_PORT_GARBAGE"), None);
        env::remove_var("COLLAB_TEST_PORT_GARBAGE");
    }
}
