use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::prompt;
use crate::error::Result;
use crate::model::{ChatModel, Message};
use crate::workflow::graph::Stage;
use crate::workflow::state::{StateUpdate, WorkflowState};

/// Writes the reply posted back on the issue.
pub struct ResponderStage {
    model: Arc<dyn ChatModel>,
}

impl ResponderStage {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for ResponderStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        let response = self
            .model
            .invoke(
                prompt::RESPONDER_SYSTEM,
                &[Message::human(prompt::responder_human(state))],
                &[],
            )
            .await?;

        tracing::info!(chars = response.content.len(), "Issue response written");

        Ok(StateUpdate {
            issue_response: Some(response.content),
            ..Default::default()
        })
    }
}
