use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{GenerationError, GenerationOutcome, Generator, ToolCall, ToolDefinition};
use crate::config::GenerationConfig;
use crate::http::{HttpResponse, RateLimitedHttpClient};
use crate::workflows::state::{Message, Role};

/// Generator backed by an OpenAI-compatible `/chat/completions` endpoint
/// (Groq by default)
#[derive(Debug)]
pub struct ChatCompletionsGenerator {
    http: RateLimitedHttpClient,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GenerationError::AuthFailed {
                provider: format!("{} (no API key configured)", config.base_url),
            })?;

        let http = RateLimitedHttpClient::new(&config.http)
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn messages_to_json(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|message| match message.role {
                Role::System => json!({"role": "system", "content": message.content}),
                Role::Human => json!({"role": "user", "content": message.content}),
                Role::Assistant if message.tool_calls.is_empty() => {
                    json!({"role": "assistant", "content": message.content})
                }
                Role::Assistant => {
                    let calls: Vec<Value> = message
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    let content = if message.content.is_empty() {
                        Value::Null
                    } else {
                        Value::String(message.content.clone())
                    };
                    json!({"role": "assistant", "content": content, "tool_calls": calls})
                }
                Role::Tool => json!({
                    "role": "tool",
                    "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.content,
                }),
            })
            .collect()
    }

    fn tools_to_json(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect()
    }

    fn parse_response(body: &Value) -> Result<GenerationOutcome, GenerationError> {
        let message = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| GenerationError::ResponseParse {
                message: "No message in first choice".to_string(),
            })?;

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        let id = call.get("id")?.as_str()?.to_string();
                        let function = call.get("function")?;
                        let name = function.get("name")?.as_str()?.to_string();
                        let arguments = match function.get("arguments") {
                            Some(Value::String(raw)) => {
                                serde_json::from_str(raw).unwrap_or_else(|_| json!({}))
                            }
                            Some(other) => other.clone(),
                            None => json!({}),
                        };
                        Some(ToolCall {
                            id,
                            name,
                            arguments,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(GenerationOutcome::from_parts(content, calls))
    }

    fn map_http_error(response: &HttpResponse) -> GenerationError {
        match response.status {
            401 => GenerationError::AuthFailed {
                provider: "OpenAI-compatible".to_string(),
            },
            429 => {
                let retry_after_secs = response
                    .header("retry-after")
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(5);
                GenerationError::RateLimited { retry_after_secs }
            }
            status => GenerationError::Api {
                status,
                message: response.body.clone(),
            },
        }
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    async fn generate(
        &self,
        conversation: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<GenerationOutcome, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": Self::messages_to_json(conversation),
            "stream": false,
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !tools.is_empty() {
            body["tools"] = json!(Self::tools_to_json(tools));
        }

        debug!(
            url = %url,
            model = %self.model,
            messages = conversation.len(),
            tools = tools.len(),
            "Sending chat completion request"
        );

        let authorization = format!("Bearer {}", self.api_key);
        let response = self
            .http
            .post_json(&url, &[("Authorization", authorization.as_str())], &body)
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(Self::map_http_error(&response));
        }

        let json: Value =
            serde_json::from_str(&response.body).map_err(|e| GenerationError::ResponseParse {
                message: format!("Invalid JSON: {e}"),
            })?;

        Self::parse_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    #[test]
    fn new_requires_api_key() {
        let config = GenerationConfig::default();
        let result = ChatCompletionsGenerator::new(&config);
        assert!(matches!(result, Err(GenerationError::AuthFailed { .. })));
    }

    #[test]
    fn messages_map_to_openai_roles() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "search".to_string(),
            arguments: json!({"query": "ai"}),
        };
        let messages = vec![
            Message::system("be brief"),
            Message::human("write a post"),
            Message::assistant_with_tool_calls("", vec![call.clone()]),
            Message::tool_result(&call, "results"),
            Message::assistant("Draft"),
        ];

        let json = ChatCompletionsGenerator::messages_to_json(&messages);

        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[2]["role"], "assistant");
        assert!(json[2]["content"].is_null());
        assert_eq!(json[2]["tool_calls"][0]["function"]["name"], "search");
        assert_eq!(json[2]["tool_calls"][0]["function"]["arguments"], r#"{"query":"ai"}"#);
        assert_eq!(json[3]["role"], "tool");
        assert_eq!(json[3]["tool_call_id"], "call_1");
        assert_eq!(json[4]["content"], "Draft");
    }

    #[test]
    fn parse_text_response() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello LinkedIn"}, "finish_reason": "stop"}]
        });
        let outcome = ChatCompletionsGenerator::parse_response(&body).unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::TextOnly {
                content: "Hello LinkedIn".to_string()
            }
        );
    }

    #[test]
    fn parse_tool_call_response() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "search", "arguments": "{\"query\":\"AI trends 2025\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });

        match ChatCompletionsGenerator::parse_response(&body).unwrap() {
            GenerationOutcome::WithToolCalls { content, calls } => {
                assert!(content.is_empty());
                assert_eq!(calls[0].id, "call_abc");
                assert_eq!(calls[0].arguments["query"], "AI trends 2025");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[test]
    fn parse_response_without_choices_fails() {
        let result = ChatCompletionsGenerator::parse_response(&json!({"choices": []}));
        assert!(matches!(result, Err(GenerationError::ResponseParse { .. })));
    }

    #[test]
    fn http_errors_map_by_status() {
        let response = |status: u16| HttpResponse {
            status,
            headers: HeaderMap::new(),
            body: "nope".to_string(),
        };

        assert!(matches!(
            ChatCompletionsGenerator::map_http_error(&response(401)),
            GenerationError::AuthFailed { .. }
        ));
        assert!(matches!(
            ChatCompletionsGenerator::map_http_error(&response(429)),
            GenerationError::RateLimited { retry_after_secs: 5 }
        ));
        assert!(matches!(
            ChatCompletionsGenerator::map_http_error(&response(500)),
            GenerationError::Api { status: 500, .. }
        ));
    }
}
