use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::DEFAULT_ORACLE_URL;

/// Default cap on in-flight oracle calls across one evaluation run.
pub const DEFAULT_MAX_CONCURRENT_JUDGMENTS: usize = 70;
/// Default per-call deadline before a judgment is recorded as failed.
pub const DEFAULT_JUDGMENT_TIMEOUT_SECS: u64 = 35;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub oracle_base_url: String,
    pub max_concurrent_judgments: usize,
    pub judgment_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let max_concurrent_judgments = parse_env(
            "MAX_CONCURRENT_JUDGMENTS",
            DEFAULT_MAX_CONCURRENT_JUDGMENTS,
        )?;
        if max_concurrent_judgments == 0 {
            bail!("MAX_CONCURRENT_JUDGMENTS must be at least 1");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            oracle_base_url: std::env::var("ORACLE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_ORACLE_URL.to_string()),
            max_concurrent_judgments,
            judgment_timeout: Duration::from_secs(parse_env(
                "JUDGMENT_TIMEOUT_SECS",
                DEFAULT_JUDGMENT_TIMEOUT_SECS,
            )?),
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_falls_back_to_default() {
        let value: usize = parse_env("EVALUATOR_TEST_UNSET_VARIABLE", 70).unwrap();
        assert_eq!(value, 70);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("EVALUATOR_TEST_GARBAGE_NUMBER", "seventy");
        let result: Result<usize> = parse_env("EVALUATOR_TEST_GARBAGE_NUMBER", 70);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_env_trims_whitespace() {
        std::env::set_var("EVALUATOR_TEST_PADDED_NUMBER", " 12 ");
        let value: u64 = parse_env("EVALUATOR_TEST_PADDED_NUMBER", 35).unwrap();
        assert_eq!(value, 12);
    }
}
