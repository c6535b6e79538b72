use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::pricing::{calculate_cost, provider_endpoint};
use super::{GenerateRequest, GenerateResponse, Provider};
use crate::backoff;
use crate::telemetry::metrics::{
    GEN_AI_COST, GEN_AI_ERROR_COUNT, GEN_AI_FALLBACK_COUNT, GEN_AI_OPERATION_DURATION,
    GEN_AI_RETRY_COUNT, GEN_AI_TOKEN_USAGE,
};

const DEFAULT_MAX_RETRIES: u32 = 3;

pub struct LlmClient {
    pub primary: Arc<dyn Provider>,
    pub fallback: Option<Arc<dyn Provider>>,
    pub primary_provider: String,
    pub fallback_provider: String,
    pub fallback_model: String,
    max_retries: u32,
    base_delay: Duration,
}

impl LlmClient {
    pub fn new(primary: Arc<dyn Provider>, primary_provider: &str) -> Self {
        Self {
            primary,
            fallback: None,
            primary_provider: primary_provider.to_string(),
            fallback_provider: String::new(),
            fallback_model: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_fallback(
        mut self,
        fallback: Option<Arc<dyn Provider>>,
        fallback_provider: &str,
        fallback_model: &str,
    ) -> Self {
        self.fallback = fallback;
        self.fallback_provider = fallback_provider.to_string();
        self.fallback_model = fallback_model.to_string();
        self
    }

    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.base_delay = base_delay;
        self
    }

    pub async fn generate_once(
        &self,
        provider: &dyn Provider,
        provider_name: &str,
        req: &GenerateRequest,
    ) -> anyhow::Result<GenerateResponse> {
        let span_display_name = format!("gen_ai.chat {}", req.model);
        let start = Instant::now();

        let (server_addr, server_port) = provider_endpoint(provider_name);

        let span = tracing::info_span!(
            "gen_ai.chat",
            otel.name = %span_display_name,
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = %provider_name,
            gen_ai.request.model = %req.model,
            server.address = %server_addr,
            server.port = server_port,
            gen_ai.request.temperature = req.temperature,
            gen_ai.request.max_tokens = req.max_tokens as i64,
            gen_ai.response.model = tracing::field::Empty,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            gen_ai.usage.cost_usd = tracing::field::Empty,
            gen_ai.response.finish_reasons = tracing::field::Empty,
            agent.stage = %req.stage,
            otel.status_code = tracing::field::Empty,
            error.type = tracing::field::Empty,
        );

        {
            let mut user_event_attrs =
                vec![KeyValue::new("gen_ai.prompt", truncate(&req.prompt, 1000))];
            if !req.system.is_empty() {
                user_event_attrs.push(KeyValue::new(
                    "gen_ai.system_instructions",
                    truncate(&req.system, 500),
                ));
            }
            span.add_event("gen_ai.user.message", user_event_attrs);
        }

        let result = provider.generate(req).instrument(span.clone()).await;

        let duration = start.elapsed().as_secs_f64();

        match result {
            Ok(mut resp) => {
                resp.provider = provider_name.to_string();
                resp.cost_usd = calculate_cost(&resp.model, resp.input_tokens, resp.output_tokens);

                span.record("gen_ai.response.model", resp.model.as_str());
                span.record("gen_ai.usage.input_tokens", resp.input_tokens as i64);
                span.record("gen_ai.usage.output_tokens", resp.output_tokens as i64);
                span.record("gen_ai.usage.cost_usd", resp.cost_usd);
                if !resp.finish_reason.is_empty() {
                    span.record(
                        "gen_ai.response.finish_reasons",
                        resp.finish_reason.as_str(),
                    );
                }

                span.add_event(
                    "gen_ai.assistant.message",
                    vec![KeyValue::new(
                        "gen_ai.completion",
                        truncate(&resp.content, 2000),
                    )],
                );

                record_usage(&resp, provider_name, duration);

                Ok(resp)
            }
            Err(err) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.type", classify_error(&err));

                GEN_AI_ERROR_COUNT.add(
                    1,
                    &[
                        KeyValue::new("gen_ai.provider.name", provider_name.to_string()),
                        KeyValue::new("gen_ai.request.model", req.model.clone()),
                    ],
                );

                Err(err)
            }
        }
    }

    pub async fn generate_with_retry(
        &self,
        provider: &dyn Provider,
        provider_name: &str,
        req: &GenerateRequest,
    ) -> anyhow::Result<GenerateResponse> {
        let max_retries = self.max_retries;
        let mut last_err = None;

        for attempt in 0..max_retries {
            match self.generate_once(provider, provider_name, req).await {
                Ok(resp) => return Ok(resp),
                Err(err) if !is_retryable(&err) => {
                    tracing::warn!(
                        provider = provider_name,
                        model = %req.model,
                        error = %err,
                        "LLM call failed, not retryable"
                    );
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = max_retries,
                        provider = provider_name,
                        model = %req.model,
                        error = %err,
                        "LLM call failed, retrying"
                    );

                    if attempt > 0 {
                        GEN_AI_RETRY_COUNT.add(
                            1,
                            &[
                                KeyValue::new("gen_ai.provider.name", provider_name.to_string()),
                                KeyValue::new("gen_ai.request.model", req.model.clone()),
                            ],
                        );
                    }

                    last_err = Some(err);

                    if attempt < max_retries - 1 {
                        tokio::time::sleep(backoff::delay(self.base_delay, attempt)).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("all retries exhausted")))
    }

    pub async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let result = self
            .generate_with_retry(self.primary.as_ref(), &self.primary_provider, req)
            .await;

        match result {
            Ok(resp) => Ok(resp),
            Err(primary_err) => {
                if let Some(ref fallback) = self.fallback {
                    tracing::warn!(
                        primary_provider = %self.primary_provider,
                        fallback_provider = %self.fallback_provider,
                        error = %primary_err,
                        "Primary provider failed, falling back"
                    );

                    GEN_AI_FALLBACK_COUNT.add(1, &[]);

                    let fallback_req = GenerateRequest {
                        model: self.fallback_model.clone(),
                        ..req.clone()
                    };

                    self.generate_with_retry(
                        fallback.as_ref(),
                        &self.fallback_provider,
                        &fallback_req,
                    )
                    .await
                } else {
                    Err(anyhow::anyhow!(
                        "primary provider {} failed after retries: {}",
                        self.primary_provider,
                        primary_err
                    ))
                }
            }
        }
    }
}

fn record_usage(resp: &GenerateResponse, provider_name: &str, duration: f64) {
    let attrs = [
        KeyValue::new("gen_ai.operation.name", "chat"),
        KeyValue::new("gen_ai.provider.name", provider_name.to_string()),
        KeyValue::new("gen_ai.request.model", resp.model.clone()),
    ];
    for (token_type, count) in [("input", resp.input_tokens), ("output", resp.output_tokens)] {
        let mut token_attrs = attrs.to_vec();
        token_attrs.push(KeyValue::new("gen_ai.token.type", token_type));
        GEN_AI_TOKEN_USAGE.record(f64::from(count), &token_attrs);
    }
    GEN_AI_OPERATION_DURATION.record(duration, &attrs);
    GEN_AI_COST.add(resp.cost_usd, &attrs);
}

/// Bad credentials and malformed requests fail the same way every time.
fn is_retryable(err: &anyhow::Error) -> bool {
    !matches!(classify_error(err), "auth_error" | "invalid_request")
}

fn classify_error(err: &anyhow::Error) -> &'static str {
    let msg = err.to_string().to_lowercase();
    if msg.contains("rate limit") || msg.contains("429") {
        "rate_limit"
    } else if msg.contains("timeout") || msg.contains("timed out") || msg.contains("deadline") {
        "timeout"
    } else if msg.contains("401")
        || msg.contains("403")
        || msg.contains("auth")
        || msg.contains("api key")
    {
        "auth_error"
    } else if msg.contains("400") || msg.contains("422") || msg.contains("invalid") {
        "invalid_request"
    } else if msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("server")
    {
        "server_error"
    } else if msg.contains("connect")
        || msg.contains("dns")
        || msg.contains("network")
        || msg.contains("reset")
    {
        "network_error"
    } else {
        "unknown_error"
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.char_indices()
            .take_while(|&(i, _)| i < max)
            .map(|(_, c)| c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedProvider;

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "gpt-4.1-mini".to_string(),
            system: "You are terse.".to_string(),
            prompt: "Summarize the channel.".to_string(),
            temperature: 0.3,
            max_tokens: 256,
            stage: "analyze".to_string(),
        }
    }

    #[tokio::test]
    async fn test_generate_retries_then_succeeds() {
        let primary = Arc::new(
            ScriptedProvider::new("openai")
                .fail("503 service unavailable")
                .reply("{\"ok\": true}"),
        );
        let client =
            LlmClient::new(primary.clone(), "openai").with_retry(3, Duration::from_millis(1));

        let resp = client.generate(&request()).await.unwrap();
        assert_eq!(resp.content, "{\"ok\": true}");
        assert_eq!(resp.provider, "openai");
        assert_eq!(primary.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_generate_falls_back_with_fallback_model() {
        let primary = Arc::new(
            ScriptedProvider::new("openai")
                .fail("429 rate limit")
                .fail("429 rate limit"),
        );
        let fallback = Arc::new(ScriptedProvider::new("anthropic").reply("fallback says hi"));
        let client = LlmClient::new(primary.clone(), "openai")
            .with_fallback(
                Some(fallback.clone()),
                "anthropic",
                "claude-haiku-4-5-20251001",
            )
            .with_retry(2, Duration::from_millis(1));

        let resp = client.generate(&request()).await.unwrap();
        assert_eq!(resp.content, "fallback says hi");
        assert_eq!(resp.provider, "anthropic");
        assert_eq!(primary.requests().len(), 2);
        let sent = fallback.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].model, "claude-haiku-4-5-20251001");
        assert_eq!(sent[0].stage, "analyze");
    }

    #[tokio::test]
    async fn test_generate_without_fallback_reports_primary() {
        let primary = Arc::new(ScriptedProvider::new("openai").fail("401 unauthorized"));
        let client = LlmClient::new(primary, "openai").with_retry(1, Duration::from_millis(1));

        let err = client.generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("primary provider openai failed"));
        assert!(err.to_string().contains("401 unauthorized"));
    }

    #[tokio::test]
    async fn test_auth_errors_are_not_retried() {
        let primary = Arc::new(
            ScriptedProvider::new("anthropic")
                .fail("Anthropic API key is not set")
                .reply("never reached"),
        );
        let client =
            LlmClient::new(primary.clone(), "anthropic").with_retry(3, Duration::from_millis(1));

        let err = client.generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("API key is not set"));
        assert_eq!(primary.requests().len(), 1);
    }

    #[test]
    fn test_classify_error_and_retryability() {
        for (msg, kind, retryable) in [
            ("status 429: too many requests", "rate_limit", true),
            ("request timed out", "timeout", true),
            ("Anthropic API key is not set", "auth_error", false),
            ("422 unprocessable entity", "invalid_request", false),
            ("503 service unavailable", "server_error", true),
            ("connection reset by peer", "network_error", true),
            ("script exhausted", "unknown_error", true),
        ] {
            let err = anyhow::anyhow!("{msg}");
            assert_eq!(classify_error(&err), kind, "{msg}");
            assert_eq!(is_retryable(&err), retryable, "{msg}");
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("channel", 20), "channel");
        assert_eq!(truncate("channel report", 7), "channel");
        let cut = truncate("vidéo 世界", 6);
        assert!(cut.len() <= 6 && cut.is_char_boundary(cut.len()));
    }
}
