use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::workflow::graph::Stage;
use crate::workflow::state::{ChannelId, StateUpdate, WorkflowState};

/// Branch point with no work of its own; the outgoing edge does the routing.
pub struct NoopStage;

#[async_trait]
impl Stage for NoopStage {
    async fn run(&self, _state: &WorkflowState) -> Result<StateUpdate> {
        Ok(StateUpdate::none())
    }
}

/// Clears one channel.
///
/// With a retry limit it also counts edit attempts and refuses to start
/// another once the limit is spent.
pub struct ResetStage {
    channel: ChannelId,
    retry_limit: Option<u32>,
}

impl ResetStage {
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            retry_limit: None,
        }
    }

    pub fn counting_retries(channel: ChannelId, limit: u32) -> Self {
        Self {
            channel,
            retry_limit: Some(limit),
        }
    }
}

#[async_trait]
impl Stage for ResetStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        let mut update = StateUpdate::none().reset(self.channel);

        if let Some(limit) = self.retry_limit {
            let attempts = state.edit_attempts + 1;
            if attempts > limit {
                tracing::warn!(attempts = state.edit_attempts, limit, "Edit retries exhausted");
                return Err(AppError::LoopLimit {
                    what: "edit retry loop".to_string(),
                    limit,
                });
            }
            tracing::info!(attempt = attempts, limit, "Retrying edit");
            update.edit_attempts = Some(attempts);
        }

        Ok(update)
    }
}
