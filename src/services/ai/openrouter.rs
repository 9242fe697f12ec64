//! OpenRouter（OpenAI 兼容）chat completion 客户端
//!
//! ureq 是同步客户端，请求放在 spawn_blocking 中执行。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ureq::Agent;

use super::{ChatCompletion, ChatMessage, ChatProvider, ChatRequest};
use crate::errors::{Result, SeoHubError};

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<i32>,
    #[serde(default)]
    completion_tokens: Option<i32>,
}

pub struct OpenRouterProvider {
    agent: Agent,
    endpoint: String,
    api_key: String,
}

impl OpenRouterProvider {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(timeout_secs.max(1))))
            .build()
            .into();
        Self {
            agent,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    fn complete_sync(
        agent: Agent,
        endpoint: String,
        api_key: String,
        request: ChatRequest,
    ) -> Result<ChatCompletion> {
        let body = CompletionBody {
            model: &request.model,
            messages: &request.messages,
        };

        let response = agent
            .post(&endpoint)
            .header("Authorization", &format!("Bearer {}", api_key))
            .send_json(&body)
            .map_err(|e| {
                warn!("Chat completion request to {} failed: {}", endpoint, e);
                SeoHubError::chat_provider(format!("chat provider request failed: {}", e))
            })?;

        let parsed: CompletionResponse = response.into_body().read_json().map_err(|e| {
            SeoHubError::chat_provider(format!("chat provider returned invalid JSON: {}", e))
        })?;

        parse_completion(parsed, &request.model)
    }
}

fn parse_completion(parsed: CompletionResponse, requested_model: &str) -> Result<ChatCompletion> {
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| SeoHubError::chat_provider("chat provider returned no content"))?;

    let (prompt_tokens, completion_tokens) = parsed
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((None, None));

    debug!(
        "Chat completion: model={:?}, prompt_tokens={:?}, completion_tokens={:?}",
        parsed.model, prompt_tokens, completion_tokens
    );

    Ok(ChatCompletion {
        content,
        model: parsed.model.unwrap_or_else(|| requested_model.to_string()),
        prompt_tokens,
        completion_tokens,
    })
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion> {
        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        let api_key = self.api_key.clone();

        tokio::task::spawn_blocking(move || Self::complete_sync(agent, endpoint, api_key, request))
            .await
            .map_err(|e| SeoHubError::chat_provider(format!("chat provider task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash() {
        let p = OpenRouterProvider::new("https://openrouter.ai/api/v1/", "k", 10);
        assert_eq!(p.endpoint, "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn test_parse_completion() {
        let raw = r#"{
            "model": "openai/gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        let completion = parse_completion(parsed, "openai/gpt-4o-mini").unwrap();
        assert_eq!(completion.content, "Hello!");
        assert_eq!(completion.model, "openai/gpt-4o-mini-2024-07-18");
        assert_eq!(completion.prompt_tokens, Some(12));
        assert_eq!(completion.completion_tokens, Some(3));
    }

    #[test]
    fn test_parse_completion_without_choices() {
        let parsed: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = parse_completion(parsed, "m").unwrap_err();
        assert!(matches!(err, SeoHubError::ChatProvider(_)));
    }

    #[test]
    fn test_request_body_shape() {
        use crate::storage::models::MessageRole;
        let messages = vec![ChatMessage::new(MessageRole::User, "hi")];
        let body = CompletionBody {
            model: "m",
            messages: &messages,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]})
        );
    }
}
