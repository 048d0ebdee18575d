use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::engine::AgentLoop;
use crate::agent::prompt;
use crate::error::Result;
use crate::workflow::graph::Stage;
use crate::workflow::state::{ChannelId, StateUpdate, WorkflowState};
use crate::workspace::DiffProvider;

/// Tool loop that edits the checkout. Its transcript goes to the edit channel.
pub struct CodeEditingStage {
    agent: AgentLoop,
}

impl CodeEditingStage {
    pub fn new(agent: AgentLoop) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Stage for CodeEditingStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        let run = self
            .agent
            .run(
                prompt::CODE_EDITING_SYSTEM,
                &prompt::code_editing_human(state),
                state.code_edit_messages.snapshot(),
            )
            .await?;

        tracing::info!(
            attempt = state.edit_attempts,
            messages = run.messages.len(),
            "Edit loop settled"
        );

        Ok(StateUpdate::none().append(ChannelId::CodeEdit, run.messages))
    }
}

/// Read-only tool loop that reviews the current patch.
pub struct EditReviewerStage {
    agent: AgentLoop,
}

impl EditReviewerStage {
    pub fn new(agent: AgentLoop) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Stage for EditReviewerStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        let run = self
            .agent
            .run(
                prompt::EDIT_REVIEWER_SYSTEM,
                &prompt::edit_reviewer_human(state),
                state.edit_reviewer_messages.snapshot(),
            )
            .await?;

        Ok(StateUpdate::none().append(ChannelId::EditReviewer, run.messages))
    }
}

pub struct GitDiffStage {
    diff: Arc<dyn DiffProvider>,
}

impl GitDiffStage {
    pub fn new(diff: Arc<dyn DiffProvider>) -> Self {
        Self { diff }
    }
}

#[async_trait]
impl Stage for GitDiffStage {
    async fn run(&self, _state: &WorkflowState) -> Result<StateUpdate> {
        let patch = self.diff.diff().await?;
        tracing::info!(bytes = patch.len(), "Computed patch");

        Ok(StateUpdate {
            patch: Some(patch),
            ..Default::default()
        })
    }
}
