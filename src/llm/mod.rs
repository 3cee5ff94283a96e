//! Chat-completion backend client
//!
//! A thin abstraction over OpenAI-compatible chat APIs, used both for the
//! assistant reply and for topic classification (with distinct system
//! prompts and temperatures).

use crate::config::ChatModelConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One prior turn of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A chat completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub history: Vec<ChatTurn>,
    pub user_message: String,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            history: Vec::new(),
            user_message: user_message.into(),
            temperature: 0.7,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Trait for chat-completion providers
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the reply text
    async fn complete(&self, request: ChatRequest) -> Result<String>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Chat model backed by an OpenAI-compatible `/v1/chat/completions` endpoint
pub struct HttpChatModel {
    client: Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
}

impl HttpChatModel {
    pub fn new(config: &ChatModelConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> Result<Url> {
        self.base_url
            .join("/v1/chat/completions")
            .map_err(|e| Error::Config(format!("Invalid chat backend URL: {}", e)))
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ApiMessage {
            role: "system".to_string(),
            content: request.system,
        });
        for turn in request.history {
            messages.push(ApiMessage {
                role: turn.role,
                content: turn.content,
            });
        }
        messages.push(ApiMessage {
            role: "user".to_string(),
            content: request.user_message,
        });

        let body = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
        };

        debug!("Requesting completion from model {}", self.model);
        let mut http_request = self.client.post(self.endpoint()?).json(&body);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| Error::Chat(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Chat(e.to_string()))?;

        let parsed: CompletionResponse = response.json().await.map_err(|e| Error::Chat(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Chat("Completion returned no choices".to_string()))?;

        Ok(content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> ChatModelConfig {
        ChatModelConfig {
            base_url: base_url.to_string(),
            model: "test-chat".to_string(),
            api_key_env: "TUTORIA_TEST_MISSING_KEY".to_string(),
            temperature: 0.7,
            classifier_temperature: 0.1,
            history_limit: 20,
        }
    }

    #[tokio::test]
    async fn test_complete_returns_trimmed_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "test-chat"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  NO_TOPIC\n"}}]
            })))
            .mount(&server)
            .await;

        let model = HttpChatModel::new(&test_config(&server.uri())).unwrap();
        let reply = model
            .complete(ChatRequest::new("sistema", "hola").with_temperature(0.1))
            .await
            .unwrap();
        assert_eq!(reply, "NO_TOPIC");
    }

    #[tokio::test]
    async fn test_complete_maps_http_failure_to_chat_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let model = HttpChatModel::new(&test_config(&server.uri())).unwrap();
        let err = model
            .complete(ChatRequest::new("sistema", "hola"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Chat(_)));
    }
}
