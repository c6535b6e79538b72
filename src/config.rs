use std::env;
use std::str::FromStr;

use anyhow::Context;

pub const DEFAULT_YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub database_url: String,
    pub youtube_api_key: Option<String>,
    pub youtube_oauth_credentials: Option<String>,
    pub youtube_api_base_url: String,
    pub youtube_relevance_language: String,
    pub youtube_max_retries: u32,
    pub youtube_timeout_secs: u64,
    pub llm_provider: String,
    pub llm_model_capable: String,
    pub llm_model_fast: String,
    pub fallback_provider: String,
    pub fallback_model: String,
    pub ollama_base_url: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            port: parse_or(&get, "APP_PORT", 8080)?,
            environment: or("APP_ENVIRONMENT", "development"),
            database_url: get("DATABASE_URL").context("DATABASE_URL must be set")?,
            youtube_api_key: get("YOUTUBE_API_KEY"),
            youtube_oauth_credentials: get("YOUTUBE_OAUTH_CREDENTIALS"),
            youtube_api_base_url: or("YOUTUBE_API_BASE_URL", DEFAULT_YOUTUBE_API_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            youtube_relevance_language: or("YOUTUBE_RELEVANCE_LANGUAGE", "en"),
            youtube_max_retries: parse_or(&get, "YOUTUBE_MAX_RETRIES", 3)?,
            youtube_timeout_secs: parse_or(&get, "YOUTUBE_TIMEOUT_SECS", 30)?,
            llm_provider: or("LLM_PROVIDER", "openai"),
            llm_model_capable: or("LLM_MODEL_CAPABLE", "gpt-4.1"),
            llm_model_fast: or("LLM_MODEL_FAST", "gpt-4.1-mini"),
            fallback_provider: or("FALLBACK_PROVIDER", "anthropic"),
            fallback_model: or("FALLBACK_MODEL", "claude-haiku-4-5-20251001"),
            ollama_base_url: or("OLLAMA_BASE_URL", "http://localhost:11434"),
            openai_api_key: get("OPENAI_API_KEY"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            google_api_key: get("GOOGLE_API_KEY"),
            otel_service_name: or("OTEL_SERVICE_NAME", "youtube-analytics-agent"),
            otel_exporter_endpoint: or("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}
