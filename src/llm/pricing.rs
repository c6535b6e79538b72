use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;

#[derive(Debug, Deserialize, Clone)]
pub struct PriceEntry {
    #[allow(dead_code)]
    pub provider: String,
    pub input: f64,
    pub output: f64,
}

#[derive(Deserialize)]
struct PricingFile {
    models: HashMap<String, PriceEntry>,
}

const EMBEDDED_PRICING: &str = include_str!("../../pricing.json");

/// Per-million-token prices. `PRICING_JSON_PATH` overrides the embedded table.
pub static PRICING: LazyLock<HashMap<String, PriceEntry>> = LazyLock::new(|| {
    if let Ok(path) = std::env::var("PRICING_JSON_PATH")
        && !path.is_empty()
    {
        match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|data| parse_pricing(&data))
        {
            Ok(models) => return models,
            Err(e) => tracing::warn!(path = %path, error = %e, "ignoring pricing override"),
        }
    }
    parse_pricing(EMBEDDED_PRICING).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "embedded pricing table unreadable, costs will be $0.00");
        HashMap::new()
    })
});

fn parse_pricing(data: &str) -> anyhow::Result<HashMap<String, PriceEntry>> {
    let parsed: PricingFile = serde_json::from_str(data)?;
    if parsed.models.is_empty() {
        anyhow::bail!("pricing table has no models");
    }
    Ok(parsed.models)
}

pub fn calculate_cost(model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    match PRICING.get(model) {
        Some(entry) => {
            (f64::from(input_tokens) * entry.input / 1_000_000.0)
                + (f64::from(output_tokens) * entry.output / 1_000_000.0)
        }
        None => 0.0,
    }
}

/// `server.address` and `server.port` span attributes for a provider.
pub fn provider_endpoint(provider: &str) -> (&'static str, i64) {
    match provider {
        "openai" => ("api.openai.com", 443),
        "anthropic" => ("api.anthropic.com", 443),
        "google" => ("generativelanguage.googleapis.com", 443),
        "ollama" => ("localhost", 11434),
        _ => ("unknown", 443),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_cost_known_model() {
        assert!(
            PRICING.contains_key("gpt-4.1"),
            "pricing.json must contain gpt-4.1"
        );
        let cost = calculate_cost("gpt-4.1", 1_000_000, 1_000_000);
        assert!(cost > 0.0, "cost should be positive for known model");
    }

    #[test]
    fn test_calculate_cost_unknown_model() {
        let cost = calculate_cost("nonexistent-model-xyz", 1000, 1000);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn test_calculate_cost_zero_tokens() {
        let cost = calculate_cost("gpt-4.1", 0, 0);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn test_parse_pricing_rejects_empty_table() {
        assert!(parse_pricing(r#"{"models": {}}"#).is_err());
        assert!(parse_pricing("not json").is_err());
        let models =
            parse_pricing(r#"{"models": {"m": {"provider": "p", "input": 1.0, "output": 2.0}}}"#)
                .unwrap();
        assert_eq!(models["m"].output, 2.0);
    }

    #[test]
    fn test_embedded_pricing_covers_default_models() {
        let models = parse_pricing(EMBEDDED_PRICING).unwrap();
        for model in ["gpt-4.1", "gpt-4.1-mini", "claude-haiku-4-5-20251001"] {
            assert!(models.contains_key(model), "{model} missing from pricing table");
        }
    }

    #[test]
    fn test_provider_endpoint() {
        assert_eq!(provider_endpoint("anthropic"), ("api.anthropic.com", 443));
        assert_eq!(provider_endpoint("ollama"), ("localhost", 11434));
        assert_eq!(provider_endpoint("mystery"), ("unknown", 443));
    }
}
