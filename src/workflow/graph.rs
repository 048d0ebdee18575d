use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::{AppError, Result};
use crate::workflow::checkpoint::{Checkpoint, Checkpointer};
use crate::workflow::router::Router;
use crate::workflow::state::{StateUpdate, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Start,
    BeforeTest,
    IssueToQuery,
    ContextProvider,
    RequireEditClassifier,
    CodeEditing,
    GitDiff,
    EditReviewer,
    EditReviewClassifier,
    ResetReviewerMessages,
    ResetEditMessages,
    BuildBranch,
    Build,
    BuildClassifier,
    TestBranch,
    AfterTest,
    TestClassifier,
    FixedIssueClassifier,
    SuccessBranch,
    Responder,
}

impl StageId {
    pub fn as_str(self) -> &'static str {
        match self {
            StageId::Start => "start",
            StageId::BeforeTest => "before_test",
            StageId::IssueToQuery => "issue_to_query",
            StageId::ContextProvider => "context_provider",
            StageId::RequireEditClassifier => "require_edit_classifier",
            StageId::CodeEditing => "code_editing",
            StageId::GitDiff => "git_diff",
            StageId::EditReviewer => "edit_reviewer",
            StageId::EditReviewClassifier => "edit_review_classifier",
            StageId::ResetReviewerMessages => "reset_reviewer_messages",
            StageId::ResetEditMessages => "reset_edit_messages",
            StageId::BuildBranch => "build_branch",
            StageId::Build => "build",
            StageId::BuildClassifier => "build_classifier",
            StageId::TestBranch => "test_branch",
            StageId::AfterTest => "after_test",
            StageId::TestClassifier => "test_classifier",
            StageId::FixedIssueClassifier => "fixed_issue_classifier",
            StageId::SuccessBranch => "success_branch",
            StageId::Responder => "responder",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Stage(StageId),
    End,
}

impl Target {
    fn stage(self) -> Option<StageId> {
        match self {
            Target::Stage(id) => Some(id),
            Target::End => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Edge {
    Direct(Target),
    Branch {
        router: Router,
        on_true: Target,
        on_false: Target,
    },
}

impl Edge {
    fn targets(&self) -> [Target; 2] {
        match *self {
            Edge::Direct(t) => [t, t],
            Edge::Branch {
                on_true, on_false, ..
            } => [on_true, on_false],
        }
    }
}

/// One processing step: reads the state, returns a partial update.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate>;
}

pub struct GraphBuilder {
    entry: StageId,
    stages: HashMap<StageId, Arc<dyn Stage>>,
    edges: HashMap<StageId, Edge>,
}

impl GraphBuilder {
    pub fn new(entry: StageId) -> Self {
        Self {
            entry,
            stages: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    pub fn stage(mut self, id: StageId, stage: impl Stage + 'static) -> Self {
        self.stages.insert(id, Arc::new(stage));
        self
    }

    pub fn edge(mut self, from: StageId, to: Target) -> Self {
        self.edges.insert(from, Edge::Direct(to));
        self
    }

    pub fn branch(mut self, from: StageId, router: Router, on_true: Target, on_false: Target) -> Self {
        self.edges.insert(
            from,
            Edge::Branch {
                router,
                on_true,
                on_false,
            },
        );
        self
    }

    /// Validate the wiring and produce a runnable graph.
    pub fn build(self, checkpointer: Arc<dyn Checkpointer>) -> Result<WorkflowGraph> {
        if !self.stages.contains_key(&self.entry) {
            return Err(AppError::Graph(format!(
                "entry stage {} is not registered",
                self.entry
            )));
        }

        for id in self.stages.keys() {
            if !self.edges.contains_key(id) {
                return Err(AppError::Graph(format!("stage {id} has no outgoing edge")));
            }
        }

        for (from, edge) in &self.edges {
            if !self.stages.contains_key(from) {
                return Err(AppError::Graph(format!(
                    "edge from unregistered stage {from}"
                )));
            }
            for target in edge.targets() {
                if let Target::Stage(to) = target {
                    if !self.stages.contains_key(&to) {
                        return Err(AppError::Graph(format!(
                            "edge {from} -> {to} targets an unregistered stage"
                        )));
                    }
                }
            }
        }

        Ok(WorkflowGraph {
            entry: self.entry,
            stages: self.stages,
            edges: self.edges,
            checkpointer,
        })
    }
}

/// Validated stage graph with checkpointed, resumable execution.
pub struct WorkflowGraph {
    entry: StageId,
    stages: HashMap<StageId, Arc<dyn Stage>>,
    edges: HashMap<StageId, Edge>,
    checkpointer: Arc<dyn Checkpointer>,
}

impl WorkflowGraph {
    /// Run `thread_id` to `End`.
    ///
    /// A thread with a checkpoint resumes from it and `initial` is ignored; a
    /// finished thread returns its stored state without running anything.
    pub async fn invoke(&self, thread_id: &str, initial: WorkflowState) -> Result<WorkflowState> {
        let (mut state, mut next, mut step) = match self.checkpointer.load(thread_id).await? {
            Some(cp) if cp.is_finished() => {
                tracing::info!(thread_id, "Thread already finished, returning stored state");
                return Ok(cp.state);
            }
            Some(cp) => {
                tracing::info!(thread_id, next = ?cp.next, step = cp.step, "Resuming thread");
                (cp.state, cp.next, cp.step)
            }
            None => {
                let cp = Checkpoint {
                    thread_id: thread_id.to_string(),
                    state: initial,
                    next: Some(self.entry),
                    step: 0,
                    updated_at: Utc::now(),
                };
                self.checkpointer.save(&cp).await?;
                (cp.state, cp.next, 0)
            }
        };

        while let Some(id) = next {
            let stage = self
                .stages
                .get(&id)
                .ok_or_else(|| AppError::Graph(format!("stage {id} is not registered")))?;

            let span = tracing::info_span!("stage", stage = %id, thread_id = %thread_id);
            let update = async {
                tracing::debug!("Entering stage");
                stage.run(&state).await
            }
            .instrument(span)
            .await
            .map_err(|e| {
                tracing::error!(thread_id, stage = %id, error = %e, "Stage failed");
                e
            })?;

            state.apply(update);
            next = self.next(id, &state)?.stage();
            step += 1;

            self.checkpointer
                .save(&Checkpoint {
                    thread_id: thread_id.to_string(),
                    state: state.clone(),
                    next,
                    step,
                    updated_at: Utc::now(),
                })
                .await?;
        }

        tracing::info!(thread_id, steps = step, "Thread finished");
        Ok(state)
    }

    fn next(&self, from: StageId, state: &WorkflowState) -> Result<Target> {
        match self.edges.get(&from) {
            Some(Edge::Direct(target)) => Ok(*target),
            Some(Edge::Branch {
                router,
                on_true,
                on_false,
            }) => {
                let taken = router.route(state);
                tracing::debug!(stage = %from, router = %router, taken, "Routed");
                Ok(if taken { *on_true } else { *on_false })
            }
            None => Err(AppError::Graph(format!("stage {from} has no outgoing edge"))),
        }
    }
}
