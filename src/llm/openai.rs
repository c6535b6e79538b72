use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        CreateChatCompletionResponse,
    },
};

use super::{GenerateRequest, GenerateResponse, Provider};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Any backend speaking the OpenAI chat completions API: OpenAI itself,
/// Gemini's compatibility endpoint and a local Ollama server.
pub struct OpenAICompatibleProvider {
    client: Client<OpenAIConfig>,
    provider_name: &'static str,
    api_base: String,
    has_key: bool,
}

impl OpenAICompatibleProvider {
    fn build(provider_name: &'static str, api_key: &str, api_base: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.clone());
        Self {
            client: Client::with_config(config),
            provider_name,
            api_base,
            has_key: !api_key.trim().is_empty(),
        }
    }

    pub fn openai(api_key: &str) -> Self {
        Self::build("openai", api_key, OPENAI_API_BASE.to_string())
    }

    pub fn google(api_key: &str) -> Self {
        Self::build("google", api_key, GOOGLE_API_BASE.to_string())
    }

    /// Ollama ignores the key but the client still sends one.
    pub fn ollama(base_url: &str) -> Self {
        let base = format!("{}/v1", base_url.trim_end_matches('/'));
        Self::build("ollama", "ollama", base)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

fn chat_request(req: &GenerateRequest) -> CreateChatCompletionRequest {
    let messages = vec![
        ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(req.system.clone()),
            name: None,
        }),
        ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(req.prompt.clone()),
            name: None,
        }),
    ];

    #[allow(deprecated)]
    let request = CreateChatCompletionRequest {
        model: req.model.clone(),
        messages,
        temperature: Some(req.temperature),
        max_completion_tokens: Some(req.max_tokens),
        ..Default::default()
    };
    request
}

fn into_generate_response(response: CreateChatCompletionResponse) -> GenerateResponse {
    let first = response.choices.first();
    let content = first
        .and_then(|c| c.message.content.clone())
        .unwrap_or_default();
    let finish_reason = first
        .and_then(|c| c.finish_reason)
        .map(|r| format!("{r:?}").to_lowercase())
        .unwrap_or_default();
    let (input_tokens, output_tokens) = response
        .usage
        .as_ref()
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    GenerateResponse {
        content,
        model: response.model,
        input_tokens,
        output_tokens,
        cost_usd: 0.0,
        finish_reason,
        provider: String::new(),
    }
}

#[async_trait::async_trait]
impl Provider for OpenAICompatibleProvider {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        if !self.has_key {
            anyhow::bail!("{} API key is not set", self.provider_name);
        }

        let response = self.client.chat().create(chat_request(req)).await?;
        Ok(into_generate_response(response))
    }

    fn name(&self) -> &str {
        self.provider_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "gpt-4.1-mini".into(),
            system: "You are a YouTube analyst.".into(),
            prompt: "Summarize the channel.".into(),
            temperature: 0.3,
            max_tokens: 800,
            stage: "analyze".into(),
        }
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(OpenAICompatibleProvider::openai("k").api_base(), OPENAI_API_BASE);
        assert_eq!(OpenAICompatibleProvider::google("k").api_base(), GOOGLE_API_BASE);
        let ollama = OpenAICompatibleProvider::ollama("http://localhost:11434/");
        assert_eq!(ollama.api_base(), "http://localhost:11434/v1");
        assert_eq!(ollama.name(), "ollama");
    }

    #[test]
    fn test_chat_request_carries_system_and_prompt() {
        let chat = chat_request(&request());
        assert_eq!(chat.model, "gpt-4.1-mini");
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.max_completion_tokens, Some(800));
        assert!(matches!(
            chat.messages[0],
            ChatCompletionRequestMessage::System(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let err = OpenAICompatibleProvider::google(" ")
            .generate(&request())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "google API key is not set");
    }
}
