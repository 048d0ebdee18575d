use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::{AppError, Result};
use crate::model::{
    ChatModel, Message, ModelResponse, OutputSchema, Role, ToolCallRequest, ToolDefinition,
};

const API_VERSION: &str = "2023-06-01";

pub struct ClaudeClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeClient {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    pub async fn send_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AppError::ModelTransient(e.to_string())
                } else {
                    AppError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body = response.json::<MessagesResponse>().await?;

        tracing::debug!(
            id = %body.id,
            input_tokens = body.usage.input_tokens,
            output_tokens = body.usage.output_tokens,
            stop_reason = ?body.stop_reason,
            "Model response"
        );
        if body.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!("Model response hit max_tokens limit");
        }

        Ok(body)
    }

    fn request(
        &self,
        system: &str,
        messages: &[Message],
        tools: Vec<ToolDefinition>,
        tool_choice: Option<ToolChoice>,
    ) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.to_string(),
            messages: to_wire_messages(messages),
            tools,
            tool_choice,
        }
    }
}

fn classify_status(status: StatusCode, body: String) -> AppError {
    let detail = format!("API returned {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS {
        AppError::ModelRateLimited(detail)
    } else if status.is_server_error() || status.as_u16() == 529 {
        AppError::ModelTransient(detail)
    } else {
        AppError::ModelApi(detail)
    }
}

#[async_trait]
impl ChatModel for ClaudeClient {
    async fn invoke(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse> {
        let request = self.request(system, messages, tools.to_vec(), None);
        let response = self.send_message(&request).await?;

        let mut content = Vec::new();
        let mut tool_calls = Vec::new();
        for block in response.content {
            match block {
                ContentBlock::Text { text } => content.push(text),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCallRequest {
                    id,
                    name,
                    arguments: input,
                }),
                ContentBlock::ToolResult { .. } => {}
            }
        }

        Ok(ModelResponse {
            content: content.join("\n"),
            tool_calls,
        })
    }

    async fn invoke_structured(
        &self,
        system: &str,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<serde_json::Value> {
        // Forcing a single tool turns the tool input into the structured answer.
        let tool = ToolDefinition {
            name: schema.name.clone(),
            description: schema.description.clone(),
            input_schema: schema.schema.clone(),
        };
        let choice = ToolChoice {
            kind: "tool".to_string(),
            name: schema.name.clone(),
        };
        let request = self.request(system, messages, vec![tool], Some(choice));
        let response = self.send_message(&request).await?;

        response
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::ToolUse { name, input, .. } if name == schema.name => Some(input),
                _ => None,
            })
            .ok_or_else(|| {
                AppError::Schema(format!("model returned no `{}` payload", schema.name))
            })
    }
}

/// Convert domain messages to the Messages API shape.
///
/// Consecutive tool results are folded into one user turn, which is how the
/// API expects answers to a multi-call assistant turn.
fn to_wire_messages(messages: &[Message]) -> Vec<WireMessage> {
    let mut wire: Vec<WireMessage> = Vec::new();

    for message in messages {
        match message.role {
            Role::System | Role::Human => wire.push(WireMessage {
                role: "user".to_string(),
                content: MessageContent::Text(message.content.clone()),
            }),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !message.content.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: message.content.clone(),
                    });
                }
                for call in &message.tool_calls {
                    blocks.push(ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    });
                }
                // The API rejects an assistant turn with no content blocks.
                if blocks.is_empty() {
                    continue;
                }
                wire.push(WireMessage {
                    role: "assistant".to_string(),
                    content: MessageContent::Blocks(blocks),
                });
            }
            Role::Tool => {
                let block = ContentBlock::ToolResult {
                    tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                    content: message.content.clone(),
                    is_error: message.is_error.then_some(true),
                };
                match wire.last_mut() {
                    Some(WireMessage {
                        role,
                        content: MessageContent::Blocks(blocks),
                    }) if role.as_str() == "user" => blocks.push(block),
                    _ => wire.push(WireMessage {
                        role: "user".to_string(),
                        content: MessageContent::Blocks(vec![block]),
                    }),
                }
            }
        }
    }

    wire
}

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolChoice {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

// --- Response types ---

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_results_fold_into_one_user_turn() {
        let messages = vec![
            Message::human("fix it"),
            Message::assistant(
                "looking",
                vec![
                    ToolCallRequest {
                        id: "a".to_string(),
                        name: "read_file".to_string(),
                        arguments: json!({"relative_path": "x.rs"}),
                    },
                    ToolCallRequest {
                        id: "b".to_string(),
                        name: "read_file".to_string(),
                        arguments: json!({"relative_path": "y.rs"}),
                    },
                ],
            ),
            Message::tool_result("a", "1. fn x() {}", false),
            Message::tool_result("b", "The file y.rs does not exist.", true),
        ];

        let wire = to_wire_messages(&messages);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[2].role, "user");
        match &wire[2].content {
            MessageContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                let encoded = serde_json::to_value(&blocks[1]).unwrap();
                assert_eq!(encoded["type"], "tool_result");
                assert_eq!(encoded["tool_use_id"], "b");
                assert_eq!(encoded["is_error"], true);
            }
            MessageContent::Text(_) => panic!("expected tool result blocks"),
        }
    }

    #[test]
    fn test_empty_assistant_turn_is_not_sent() {
        let messages = vec![
            Message::human("fix it"),
            Message::assistant("", vec![]),
            Message::human("try again"),
        ];

        let wire = to_wire_messages(&messages);
        assert_eq!(wire.len(), 2);
        assert!(wire.iter().all(|m| m.role == "user"));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            AppError::ModelRateLimited(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, String::new()),
            AppError::ModelTransient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, String::new()),
            AppError::ModelApi(_)
        ));
    }

    #[test]
    fn test_response_parses_tool_use() {
        let raw = json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Reading the file"},
                {"type": "tool_use", "id": "t1", "name": "read_file", "input": {"relative_path": "a.py"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let parsed: MessagesResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.content.len(), 2);
        assert_eq!(parsed.stop_reason.as_deref(), Some("tool_use"));
    }
}
