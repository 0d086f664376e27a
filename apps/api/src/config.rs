use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::llm_client::ModelTier;

/// Application configuration loaded from environment variables.
/// Startup fails if a present variable cannot be parsed.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub ai_gateway_url: Option<String>,
    pub ai_gateway_token: Option<String>,
    pub cascade: Vec<ModelTier>,
    pub escalation_model: Option<String>,
    pub retry_base_delay: Duration,
    pub redis_url: Option<String>,
    pub analysis_cache_ttl: Duration,
    pub analysis_cache_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let cascade = match optional_env("COMPAT_CASCADE") {
            Some(raw) => parse_cascade(&raw)?,
            None => default_cascade(),
        };

        Ok(Config {
            openai_api_key: optional_env("OPENAI_API_KEY"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            ai_gateway_url: optional_env("AI_GATEWAY_URL"),
            ai_gateway_token: optional_env("AI_GATEWAY_TOKEN"),
            cascade,
            escalation_model: optional_env("COMPAT_ESCALATION_MODEL"),
            retry_base_delay: Duration::from_millis(
                parse_env("COMPAT_RETRY_BASE_DELAY_MS", 1000)
                    .context("COMPAT_RETRY_BASE_DELAY_MS must be a number of milliseconds")?,
            ),
            redis_url: optional_env("REDIS_URL"),
            analysis_cache_ttl: Duration::from_secs(
                parse_env("ANALYSIS_CACHE_TTL_SECS", 86_400)
                    .context("ANALYSIS_CACHE_TTL_SECS must be a number of seconds")?,
            ),
            analysis_cache_timeout: Duration::from_millis(
                parse_env("ANALYSIS_CACHE_TIMEOUT_MS", 250)
                    .context("ANALYSIS_CACHE_TIMEOUT_MS must be a number of milliseconds")?,
            ),
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Cheap model first, stronger model as the fallback.
pub fn default_cascade() -> Vec<ModelTier> {
    vec![
        ModelTier::new("gpt-4o-mini")
            .with_max_retries(3)
            .with_timeout_ms(20_000),
        ModelTier::new("gpt-4o")
            .with_max_retries(2)
            .with_timeout_ms(45_000),
    ]
}

/// Tier record as written in `COMPAT_CASCADE`. Omitted fields take the
/// `ModelTier::new` defaults.
#[derive(Debug, Deserialize)]
struct TierRecord {
    model: String,
    max_retries: Option<u32>,
    timeout_ms: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl From<TierRecord> for ModelTier {
    fn from(record: TierRecord) -> Self {
        let mut tier = ModelTier::new(record.model);
        if let Some(v) = record.max_retries {
            tier = tier.with_max_retries(v);
        }
        if let Some(v) = record.timeout_ms {
            tier = tier.with_timeout_ms(v);
        }
        if let Some(v) = record.temperature {
            tier = tier.with_temperature(v);
        }
        if let Some(v) = record.max_tokens {
            tier = tier.with_max_tokens(v);
        }
        tier
    }
}

/// Parses a JSON array of tier records. Range checks happen later in
/// `Cascade::new`.
pub fn parse_cascade(raw: &str) -> Result<Vec<ModelTier>> {
    let records: Vec<TierRecord> =
        serde_json::from_str(raw).context("COMPAT_CASCADE must be a JSON array of tiers")?;
    Ok(records.into_iter().map(ModelTier::from).collect())
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}
