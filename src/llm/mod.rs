pub mod anthropic;
pub mod client;
pub mod openai;
pub mod pricing;
#[cfg(test)]
pub mod scripted;

use std::sync::Arc;

use crate::config::Config;

pub use client::LlmClient;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stage: String,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub finish_reason: String,
    pub provider: String,
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse>;
    fn name(&self) -> &str;
}

/// Builds a provider by name. Unknown names yield `None`.
pub fn provider_for(name: &str, config: &Config) -> Option<Arc<dyn Provider>> {
    let key = |k: &Option<String>| k.clone().unwrap_or_default();
    let provider: Arc<dyn Provider> = match name {
        "openai" => Arc::new(openai::OpenAICompatibleProvider::openai(&key(&config.openai_api_key))),
        "anthropic" => Arc::new(anthropic::AnthropicProvider::new(&key(
            &config.anthropic_api_key,
        ))),
        "google" => Arc::new(openai::OpenAICompatibleProvider::google(&key(
            &config.google_api_key,
        ))),
        "ollama" => Arc::new(openai::OpenAICompatibleProvider::ollama(&config.ollama_base_url)),
        _ => return None,
    };
    Some(provider)
}

/// Primary provider from `LLM_PROVIDER` (OpenAI when unrecognized) and an
/// optional fallback from `FALLBACK_PROVIDER`.
pub fn client_from_config(config: &Config) -> LlmClient {
    let primary_provider = if provider_for(&config.llm_provider, config).is_some() {
        config.llm_provider.clone()
    } else {
        tracing::warn!(
            provider = %config.llm_provider,
            "unknown LLM provider, using openai"
        );
        "openai".to_string()
    };
    let primary = provider_for(&primary_provider, config)
        .unwrap_or_else(|| Arc::new(openai::OpenAICompatibleProvider::openai("")));

    let fallback = provider_for(&config.fallback_provider, config);

    tracing::info!(
        primary_provider = %primary_provider,
        fallback_provider = %config.fallback_provider,
        fallback_enabled = fallback.is_some(),
        "LLM client initialized"
    );

    LlmClient::new(primary, &primary_provider)
        .with_fallback(fallback, &config.fallback_provider, &config.fallback_model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(primary: &str, fallback: &str) -> Config {
        let vars = [
            ("DATABASE_URL", "postgres://localhost/test".to_string()),
            ("LLM_PROVIDER", primary.to_string()),
            ("FALLBACK_PROVIDER", fallback.to_string()),
        ];
        Config::from_lookup(|k| {
            vars.iter()
                .find(|(name, _)| *name == k)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn test_provider_for_known_names() {
        let cfg = config("openai", "none");
        for name in ["openai", "anthropic", "google", "ollama"] {
            let provider = provider_for(name, &cfg).unwrap();
            assert_eq!(provider.name(), name);
        }
        assert!(provider_for("none", &cfg).is_none());
    }

    #[test]
    fn test_client_from_config() {
        let client = client_from_config(&config("anthropic", "none"));
        assert_eq!(client.primary_provider, "anthropic");
        assert!(client.fallback.is_none());

        let client = client_from_config(&config("mystery", "ollama"));
        assert_eq!(client.primary_provider, "openai");
        assert_eq!(client.fallback_provider, "ollama");
        assert!(client.fallback.is_some());
    }
}
