use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::workflow::graph::Stage;
use crate::workflow::state::{StateUpdate, WorkflowState};
use crate::workspace::CommandRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyKind {
    Build,
    /// Test run on the untouched checkout, the baseline for the fixed-issue check.
    BeforeTest,
    AfterTest,
}

/// Runs the build or test collaborator and stores its raw output.
pub struct VerifyStage {
    kind: VerifyKind,
    runner: Arc<dyn CommandRunner>,
}

impl VerifyStage {
    pub fn new(kind: VerifyKind, runner: Arc<dyn CommandRunner>) -> Self {
        Self { kind, runner }
    }
}

#[async_trait]
impl Stage for VerifyStage {
    async fn run(&self, _state: &WorkflowState) -> Result<StateUpdate> {
        let result = self.runner.run().await;
        // Cleanup runs even when the run failed.
        let cleanup = self.runner.cleanup().await;

        let output = result?;
        if let Err(e) = cleanup {
            tracing::warn!(kind = ?self.kind, error = %e, "Cleanup after verification failed");
            return Err(e);
        }

        tracing::info!(kind = ?self.kind, bytes = output.len(), "Verification finished");

        let mut update = StateUpdate::none();
        match self.kind {
            VerifyKind::Build => update.build_output = Some(output),
            VerifyKind::BeforeTest => update.before_test_output = Some(output),
            VerifyKind::AfterTest => update.after_test_output = Some(output),
        }
        Ok(update)
    }
}
