use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::agent::prompt;
use crate::context::ContextRetriever;
use crate::error::{with_timeout, Result};
use crate::model::Message;
use crate::workflow::graph::Stage;
use crate::workflow::state::{ChannelId, StateUpdate, WorkflowState};

/// Formats the issue into the retrieval query.
pub struct IssueToQueryStage;

#[async_trait]
impl Stage for IssueToQueryStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        Ok(StateUpdate {
            query: Some(prompt::issue_query(state)),
            ..Default::default()
        })
    }
}

pub struct ContextProviderStage {
    retriever: Arc<dyn ContextRetriever>,
    timeout: Duration,
}

impl ContextProviderStage {
    pub fn new(retriever: Arc<dyn ContextRetriever>, timeout: Duration) -> Self {
        Self { retriever, timeout }
    }
}

#[async_trait]
impl Stage for ContextProviderStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        let summary = with_timeout(
            "context retrieval",
            self.timeout,
            self.retriever
                .retrieve(&state.query, state.context_provider_messages.snapshot()),
        )
        .await?;

        tracing::info!(chars = summary.len(), "Context retrieved");

        Ok(StateUpdate {
            summary: Some(summary.clone()),
            ..Default::default()
        }
        .append(
            ChannelId::ContextProvider,
            vec![Message::human(state.query.clone()), Message::assistant(summary, vec![])],
        ))
    }
}
