//! Deterministic [`ChatModel`] for tests: replays queued responses in order.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::model::{ChatModel, Message, ModelResponse, OutputSchema, ToolCallRequest, ToolDefinition};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub schema: Option<String>,
}

#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
    structured: Mutex<HashMap<String, VecDeque<serde_json::Value>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a final answer with no tool calls.
    pub fn reply(self, content: &str) -> Self {
        self.push(ModelResponse {
            content: content.to_string(),
            tool_calls: Vec::new(),
        })
    }

    /// Queue a turn that requests one tool call.
    pub fn tool_call(self, id: &str, name: &str, arguments: serde_json::Value) -> Self {
        self.push(ModelResponse {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            }],
        })
    }

    pub fn push(self, response: ModelResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// Queue a structured payload answered to the schema called `schema`.
    pub fn decide(self, schema: &str, payload: serde_json::Value) -> Self {
        self.structured
            .lock()
            .unwrap()
            .entry(schema.to_string())
            .or_default()
            .push_back(payload);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn structured_calls(&self, schema: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.schema.as_deref() == Some(schema))
            .collect()
    }

    pub fn pending(&self) -> usize {
        let structured: usize = self.structured.lock().unwrap().values().map(VecDeque::len).sum();
        self.responses.lock().unwrap().len() + structured
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            schema: None,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::ModelApi("scripted model has no response left".to_string()))
    }

    async fn invoke_structured(
        &self,
        system: &str,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<serde_json::Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            messages: messages.to_vec(),
            tool_names: Vec::new(),
            schema: Some(schema.name.clone()),
        });
        self.structured
            .lock()
            .unwrap()
            .get_mut(&schema.name)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                AppError::ModelApi(format!("scripted model has no `{}` decision", schema.name))
            })
    }
}

/// Convenience for the common `{flag: bool}` classifier payload.
pub fn flag(name: &str, value: bool) -> serde_json::Value {
    json!({ name: value, "explanation": "scripted" })
}
