//! Tool-calling text generation client.
//!
//! The pipeline never reads free-form completions. Every LLM call declares a
//! single tool whose parameters describe the output schema, forces the model
//! to call it, and parses the tool call arguments as JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Declaration of the one tool a structured call offers the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool arguments.
    pub parameters: Value,
}

/// Text generation constrained to a declared JSON shape.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Run a chat completion that must answer by calling `tool`, and return
    /// the raw tool arguments. Callers validate against their own schema.
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolSpec,
    ) -> ProviderResult<Value>;
}

/// OpenAI-compatible chat completions client.
pub struct ChatToolClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    /// The arguments arrive as a JSON-encoded string, not an object.
    arguments: String,
}

impl ChatToolClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| ProviderError::config("LLM_API_KEY not set"))?;
        let base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        Ok(Self::new(api_key, base_url, model))
    }
}

#[async_trait]
impl StructuredGenerator for ChatToolClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolSpec,
    ) -> ProviderResult<Value> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt }
            ],
            "tools": [{
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            }],
            "tool_choice": {
                "type": "function",
                "function": { "name": tool.name }
            }
        });

        debug!(tool = %tool.name, "Requesting structured generation");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("chat body: {e}")))?;

        let call = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.tool_calls.into_iter().next())
            .ok_or_else(|| {
                ProviderError::invalid_response("model did not produce a tool call")
            })?;

        if call.function.name != tool.name {
            return Err(ProviderError::invalid_response(format!(
                "model called unexpected tool '{}'",
                call.function.name
            )));
        }

        serde_json::from_str(&call.function.arguments).map_err(|e| {
            ProviderError::invalid_response(format!("tool arguments are not valid JSON: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool() -> ToolSpec {
        ToolSpec {
            name: "generate_image_prompts".to_string(),
            description: "Produce scene prompts".to_string(),
            parameters: serde_json::json!({ "type": "object" }),
        }
    }

    #[tokio::test]
    async fn test_generate_extracts_tool_arguments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "tool_choice": { "function": { "name": "generate_image_prompts" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "tool_calls": [{
                            "function": {
                                "name": "generate_image_prompts",
                                "arguments": "{\"scenes\":[{\"prompt\":\"a forest\"}]}"
                            }
                        }]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = ChatToolClient::new("key", server.uri(), "gpt-4o");
        let value = client.generate("sys", "user", &tool()).await.unwrap();
        assert_eq!(value["scenes"][0]["prompt"], "a forest");
    }

    #[tokio::test]
    async fn test_generate_rejects_missing_tool_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "plain text instead" } }]
            })))
            .mount(&server)
            .await;

        let client = ChatToolClient::new("key", server.uri(), "gpt-4o");
        let err = client.generate("sys", "user", &tool()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_generate_rejects_malformed_arguments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "tool_calls": [{
                            "function": {
                                "name": "generate_image_prompts",
                                "arguments": "{not json"
                            }
                        }]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = ChatToolClient::new("key", server.uri(), "gpt-4o");
        let err = client.generate("sys", "user", &tool()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
