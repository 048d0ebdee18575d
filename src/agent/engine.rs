use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::tools::{ToolOutput, ToolRegistry};
use crate::error::{AppError, Result};
use crate::model::{ChatModel, Message, ToolCallRequest};

/// Result of one settled tool loop.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Messages to append to the channel, in order: every assistant turn and
    /// one tool result per requested call. The human turn is not included.
    pub messages: Vec<Message>,
    /// Content of the final assistant turn.
    pub content: String,
}

/// Suspend/resume tool-calling loop over a fixed toolset.
pub struct AgentLoop {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    workspace_root: PathBuf,
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        workspace_root: &Path,
        max_iterations: u32,
    ) -> Self {
        Self {
            model,
            tools,
            workspace_root: workspace_root.to_path_buf(),
            max_iterations,
        }
    }

    /// Run until the model answers without tool calls.
    ///
    /// The model sees `human` followed by `prior` (the channel so far); the
    /// human turn is rebuilt from state on every call rather than stored.
    pub async fn run(&self, system_prompt: &str, human: &str, prior: &[Message]) -> Result<AgentRun> {
        let tool_definitions = self.tools.definitions();

        let mut history = Vec::with_capacity(prior.len() + 1);
        history.push(Message::human(human));
        history.extend_from_slice(prior);
        let mut produced = Vec::new();

        for turn in 0..self.max_iterations {
            tracing::debug!(turn, history = history.len(), "Agent turn");

            let response = self
                .model
                .invoke(system_prompt, &history, &tool_definitions)
                .await?;

            if response.tool_calls.is_empty() {
                tracing::info!(turns = turn + 1, "Agent completed");
                let content = response.content.clone();
                produced.push(response.into_message());
                return Ok(AgentRun {
                    messages: produced,
                    content,
                });
            }

            let calls = response.tool_calls.clone();
            let assistant = response.into_message();
            history.push(assistant.clone());
            produced.push(assistant);

            for call in &calls {
                let result = self.execute_tool(call).await;
                history.push(result.clone());
                produced.push(result);
            }
        }

        tracing::warn!(max_iterations = self.max_iterations, "Agent hit iteration limit");
        Err(AppError::LoopLimit {
            what: "tool loop".to_string(),
            limit: self.max_iterations,
        })
    }

    /// Execute one call. Every failure becomes error text for the model.
    async fn execute_tool(&self, call: &ToolCallRequest) -> Message {
        let Some(tool) = self.tools.get(&call.name) else {
            tracing::warn!(tool = %call.name, "Unknown tool requested");
            return Message::tool_result(&call.id, format!("Unknown tool: {}", call.name), true);
        };

        tracing::info!(tool = %call.name, "Executing tool");

        match tool
            .execute(&self.workspace_root, call.arguments.clone())
            .await
        {
            Ok(ToolOutput::Success(content)) => {
                tracing::debug!(tool = %call.name, "Tool succeeded");
                Message::tool_result(&call.id, content, false)
            }
            Ok(ToolOutput::Error(error)) => {
                tracing::warn!(tool = %call.name, error = %error, "Tool error");
                Message::tool_result(&call.id, error, true)
            }
            Err(e) => {
                tracing::error!(tool = %call.name, error = %e, "Tool execution error");
                Message::tool_result(&call.id, format!("Internal error: {e}"), true)
            }
        }
    }
}
