use crate::agent::UsageTally;
use crate::error::ProviderError;
use crate::providers::http;
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall, ToolSpec};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MODEL: &str = "us.anthropic.claude-sonnet-4-20250514-v1:0";

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Text {
        text: &'a str,
    },
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: Value,
    },
    ToolResult {
        tool_use_id: &'a str,
        content: &'a str,
        #[serde(skip_serializing_if = "is_false")]
        is_error: bool,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Claude models on Amazon Bedrock through `InvokeModel`, authenticated
/// with a Bedrock API key sent as a bearer token.
pub struct BedrockProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl BedrockProvider {
    pub fn new(api_key: impl Into<String>, region: &str) -> Self {
        Self {
            client: http::default_client("bedrock"),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: format!("https://bedrock-runtime.{}.amazonaws.com", region.trim()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ProviderError> {
        self.client = http::build_client("bedrock", timeout)?;
        Ok(self)
    }

    /// `{base}/model/{model}/invoke`, with the model id as one path segment.
    fn invoke_url(&self) -> Result<Url, ProviderError> {
        let invalid = |reason: String| ProviderError::Transport {
            provider: "bedrock".to_string(),
            message: format!("invalid endpoint {}: {}", self.base_url, reason),
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("not a base URL".to_string()))?
            .pop_if_empty()
            .extend(["model", self.model.as_str(), "invoke"]);
        Ok(url)
    }
}

/// System messages become the top-level `system` string. Tool results go
/// back as `user` turns, and consecutive turns of one role are merged so
/// roles alternate.
fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<AnthropicMessage<'_>>) {
    let mut system: Vec<&str> = vec![];
    let mut converted: Vec<AnthropicMessage<'_>> = vec![];

    for message in messages {
        let (role, blocks) = match message.role.as_str() {
            "system" => {
                if !message.content.trim().is_empty() {
                    system.push(&message.content);
                }
                continue;
            }
            "assistant" => {
                let mut blocks = vec![];
                if !message.content.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: &message.content,
                    });
                }
                for call in message.tool_calls.iter().flatten() {
                    blocks.push(ContentBlock::ToolUse {
                        id: &call.id,
                        name: &call.name,
                        input: tool_input(&call.arguments),
                    });
                }
                ("assistant", blocks)
            }
            "tool" => {
                let block = ContentBlock::ToolResult {
                    tool_use_id: message.tool_call_id.as_deref().unwrap_or_default(),
                    content: &message.content,
                    is_error: reports_failure(&message.content),
                };
                ("user", vec![block])
            }
            _ => ("user", vec![ContentBlock::Text { text: &message.content }]),
        };

        if blocks.is_empty() {
            continue;
        }
        match converted.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => converted.push(AnthropicMessage {
                role,
                content: blocks,
            }),
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, converted)
}

/// Tool input must be an object; arguments that do not parse are sent as `{}`.
fn tool_input(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Default::default()),
    }
}

fn reports_failure(content: &str) -> bool {
    serde_json::from_str::<Value>(content)
        .ok()
        .and_then(|v| v.get("success").and_then(Value::as_bool))
        .is_some_and(|success| !success)
}

fn convert_tools(tools: &[ToolSpec]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|t| AnthropicTool {
            name: t.name.clone(),
            description: t.description.clone(),
            input_schema: t.parameters_schema(),
        })
        .collect()
}

fn build_request<'a>(request: &ChatRequest<'a>) -> InvokeRequest<'a> {
    let (system, messages) = convert_messages(request.messages);
    let tools = request
        .tools
        .filter(|t| !t.is_empty())
        .map(convert_tools);
    InvokeRequest {
        anthropic_version: ANTHROPIC_VERSION,
        max_tokens: MAX_TOKENS,
        system,
        messages,
        tool_choice: tools.as_ref().map(|_| serde_json::json!({ "type": "auto" })),
        tools,
    }
}

#[async_trait]
impl Provider for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        let body = build_request(&request);
        let response = self
            .client
            .post(self.invoke_url()?)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| http::transport_error("bedrock", e))?;

        if !response.status().is_success() {
            return Err(http::error_from_response("bedrock", &self.model, response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| http::transport_error("bedrock", e))?;
        debug!(provider = "bedrock", bytes = body.len(), "Received completion");
        parse_response(&body)
    }
}

fn parse_response(body: &str) -> Result<ChatResponse, ProviderError> {
    let response: InvokeResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse {
            provider: "bedrock".to_string(),
            reason: e.to_string(),
        })?;

    let mut text: Vec<String> = vec![];
    let mut tool_calls = vec![];
    for block in response.content {
        match block {
            ResponseBlock::Text { text: t } if !t.is_empty() => text.push(t),
            ResponseBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                name,
                arguments: input.to_string(),
            }),
            _ => {}
        }
    }

    let usage = response
        .usage
        .map(|u| UsageTally::new(u.input_tokens, u.output_tokens))
        .unwrap_or_default();

    Ok(ChatResponse {
        text: (!text.is_empty()).then(|| text.join("\n")),
        tool_calls,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::default_specs;
    use serde_json::json;

    #[test]
    fn invoke_url_carries_model_id() {
        let provider = BedrockProvider::new("key", "eu-west-1")
            .with_model("anthropic.claude-3-5-sonnet-20240620-v1:0");
        assert_eq!(
            provider.invoke_url().unwrap().as_str(),
            "https://bedrock-runtime.eu-west-1.amazonaws.com/model/anthropic.claude-3-5-sonnet-20240620-v1:0/invoke"
        );

        let local = BedrockProvider::new("key", "us-east-1")
            .with_base_url("http://localhost:4566/")
            .with_model("claude");
        assert_eq!(local.invoke_url().unwrap().as_str(), "http://localhost:4566/model/claude/invoke");
    }

    #[test]
    fn request_merges_tool_results_into_one_user_turn() {
        let messages = vec![
            ChatMessage::system("Eres un analista de estudios Doppler."),
            ChatMessage::user("¿Cuántos estudios hay?"),
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![
                    ToolCall {
                        id: "toolu_1".into(),
                        name: "list_available_files".into(),
                        arguments: "{}".into(),
                    },
                    ToolCall {
                        id: "toolu_2".into(),
                        name: "read_structure".into(),
                        arguments: r#"{"file_name":"estudios.csv"}"#.into(),
                    },
                ],
            ),
            ChatMessage::tool_result("toolu_1", r#"{"success":true,"files":["estudios.csv"]}"#),
            ChatMessage::tool_result("toolu_2", r#"{"success":false,"error":"FileNotFound"}"#),
        ];
        let specs = default_specs();
        let request = ChatRequest {
            messages: &messages,
            tools: Some(specs.as_slice()),
        };

        let value = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(value["anthropic_version"], json!("bedrock-2023-05-31"));
        assert_eq!(value["system"], json!("Eres un analista de estudios Doppler."));
        assert_eq!(value["tool_choice"], json!({ "type": "auto" }));
        assert_eq!(value["tools"][1]["name"], json!("read_structure"));
        assert_eq!(value["tools"][1]["input_schema"]["type"], json!("object"));

        let turns = value["messages"].as_array().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1]["role"], json!("assistant"));
        assert_eq!(turns[1]["content"].as_array().unwrap().len(), 2);
        assert_eq!(turns[1]["content"][1]["type"], json!("tool_use"));
        assert_eq!(turns[1]["content"][1]["input"], json!({ "file_name": "estudios.csv" }));

        assert_eq!(turns[2]["role"], json!("user"));
        let results = turns[2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tool_use_id"], json!("toolu_1"));
        assert!(results[0].get("is_error").is_none());
        assert_eq!(results[1]["is_error"], json!(true));
    }

    #[test]
    fn parses_tool_use_and_usage() {
        let body = json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [
                { "type": "text", "text": "Voy a revisar el archivo." },
                { "type": "tool_use", "id": "toolu_9", "name": "read_structure", "input": { "file_name": "estudios.csv" } }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 1204, "output_tokens": 57 }
        })
        .to_string();

        let response = parse_response(&body).unwrap();
        assert_eq!(response.text.as_deref(), Some("Voy a revisar el archivo."));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "toolu_9");
        let arguments: Value = serde_json::from_str(&response.tool_calls[0].arguments).unwrap();
        assert_eq!(arguments, json!({ "file_name": "estudios.csv" }));
        assert_eq!(response.usage, UsageTally::new(1204, 57));
    }

    #[test]
    fn unknown_blocks_are_skipped_and_bad_bodies_rejected() {
        let body = r#"{"content":[{"type":"thinking","thinking":"..."},{"type":"text","text":"Hay 21."}]}"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.text.as_deref(), Some("Hay 21."));
        assert!(response.usage.is_empty());

        assert!(matches!(
            parse_response("<html>throttled</html>"),
            Err(ProviderError::InvalidResponse { .. })
        ));
    }
}
