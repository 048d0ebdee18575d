use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::agent::engine::AgentLoop;
use crate::agent::tools::ToolRegistry;
use crate::config::AppConfig;
use crate::context::{ContextRetriever, GrepContextRetriever, HttpContextRetriever};
use crate::error::Result;
use crate::model::claude::ClaudeClient;
use crate::model::{ChatModel, TimedModel};
use crate::workflow::checkpoint::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
use crate::workflow::graph::{GraphBuilder, StageId, Target, WorkflowGraph};
use crate::workflow::router::Router;
use crate::workflow::stages::*;
use crate::workflow::state::{ChannelId, IssueComment, ResponseMode, WorkflowState};
use crate::workspace::{CommandRunner, DiffProvider, ShellRunner};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub comments: Vec<IssueComment>,
    #[serde(default)]
    pub response_mode: ResponseMode,
    #[serde(default)]
    pub run_build: bool,
    #[serde(default)]
    pub run_test: bool,
}

impl IssueRequest {
    fn into_state(self) -> WorkflowState {
        WorkflowState {
            issue_title: self.title,
            issue_body: self.body,
            issue_comments: self.comments,
            response_mode: self.response_mode,
            run_build: self.run_build,
            run_test: self.run_test,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub thread_id: String,
    pub response: String,
    /// Unified diff of the edits; empty when the issue was only answered.
    pub patch: String,
}

/// External capabilities the workflow drives.
pub struct Collaborators {
    pub model: Arc<dyn ChatModel>,
    pub retriever: Arc<dyn ContextRetriever>,
    pub build: Arc<dyn CommandRunner>,
    pub test: Arc<dyn CommandRunner>,
    pub diff: Arc<dyn DiffProvider>,
    pub checkpointer: Arc<dyn Checkpointer>,
}

#[derive(Debug, Clone)]
pub struct EngineLimits {
    pub max_tool_iterations: u32,
    pub max_edit_attempts: u32,
    pub max_file_lines: usize,
    pub call_timeout: std::time::Duration,
}

impl From<&AppConfig> for EngineLimits {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_tool_iterations: config.engine.max_tool_iterations,
            max_edit_attempts: config.engine.max_edit_attempts,
            max_file_lines: config.engine.max_file_lines,
            call_timeout: config.engine.call_timeout(),
        }
    }
}

pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Resolves issues against one project checkout.
pub struct IssueResolver {
    graph: WorkflowGraph,
    /// Tool loops edit the checkout in place, so one invocation at a time.
    checkout: Mutex<()>,
}

impl IssueResolver {
    pub fn new(project: &Path, collaborators: Collaborators, limits: EngineLimits) -> Result<Self> {
        let graph = build_graph(project, collaborators, &limits)?;
        Ok(Self {
            graph,
            checkout: Mutex::new(()),
        })
    }

    /// Wire the production collaborators from configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let project = config.project.path.as_path();
        let limits = EngineLimits::from(config);

        let claude: Arc<dyn ChatModel> = Arc::new(ClaudeClient::new(&config.model));
        let model: Arc<dyn ChatModel> = Arc::new(TimedModel::new(claude, limits.call_timeout));

        let retriever: Arc<dyn ContextRetriever> = match &config.context.endpoint {
            Some(endpoint) => {
                tracing::info!(endpoint = %endpoint, "Using HTTP context retrieval");
                Arc::new(HttpContextRetriever::new(endpoint))
            }
            None => {
                tracing::info!("No context endpoint configured, using local keyword search");
                Arc::new(GrepContextRetriever::new(
                    project,
                    config.context.max_search_results,
                ))
            }
        };

        let checkpointer: Arc<dyn Checkpointer> = match &config.checkpoint.dir {
            Some(dir) => Arc::new(FileCheckpointer::new(dir).await?),
            None => Arc::new(MemoryCheckpointer::new()),
        };

        let timeout = config.project.command_timeout();
        let collaborators = Collaborators {
            model,
            retriever,
            build: Arc::new(ShellRunner::new(
                project,
                config.project.build_commands.clone(),
                timeout,
            )),
            test: Arc::new(ShellRunner::new(
                project,
                config.project.test_commands.clone(),
                timeout,
            )),
            diff: Arc::new(crate::workspace::GitDiff::new(project)),
            checkpointer,
        };

        Self::new(project, collaborators, limits)
    }

    /// Run (or resume) one issue thread to completion.
    pub async fn resolve_issue(
        &self,
        request: IssueRequest,
        thread_id: Option<String>,
    ) -> Result<Resolution> {
        let thread_id = thread_id.unwrap_or_else(new_thread_id);

        tracing::info!(
            thread_id = %thread_id,
            title = %request.title,
            mode = ?request.response_mode,
            run_build = request.run_build,
            run_test = request.run_test,
            "Resolving issue"
        );

        let _checkout = self.checkout.lock().await;
        let state = self.graph.invoke(&thread_id, request.into_state()).await?;

        Ok(Resolution {
            thread_id,
            response: state.issue_response,
            patch: state.patch,
        })
    }
}

fn build_graph(
    project: &Path,
    c: Collaborators,
    limits: &EngineLimits,
) -> Result<WorkflowGraph> {
    use StageId::*;
    let to = Target::Stage;

    let editor = AgentLoop::new(
        c.model.clone(),
        ToolRegistry::file_editing(limits.max_file_lines),
        project,
        limits.max_tool_iterations,
    );
    let reviewer = AgentLoop::new(
        c.model.clone(),
        ToolRegistry::read_only(limits.max_file_lines),
        project,
        limits.max_tool_iterations,
    );

    GraphBuilder::new(Start)
        .stage(Start, NoopStage)
        .stage(BeforeTest, VerifyStage::new(VerifyKind::BeforeTest, c.test.clone()))
        .stage(IssueToQuery, IssueToQueryStage)
        .stage(
            ContextProvider,
            ContextProviderStage::new(c.retriever, limits.call_timeout),
        )
        .stage(RequireEditClassifier, RequireEditClassifierStage::new(c.model.clone()))
        .stage(CodeEditing, CodeEditingStage::new(editor))
        .stage(GitDiff, GitDiffStage::new(c.diff))
        .stage(EditReviewer, EditReviewerStage::new(reviewer))
        .stage(EditReviewClassifier, EditReviewClassifierStage::new(c.model.clone()))
        .stage(ResetReviewerMessages, ResetStage::new(ChannelId::EditReviewer))
        .stage(
            ResetEditMessages,
            ResetStage::counting_retries(ChannelId::CodeEdit, limits.max_edit_attempts),
        )
        .stage(BuildBranch, NoopStage)
        .stage(Build, VerifyStage::new(VerifyKind::Build, c.build))
        .stage(BuildClassifier, BuildClassifierStage::new(c.model.clone()))
        .stage(TestBranch, NoopStage)
        .stage(AfterTest, VerifyStage::new(VerifyKind::AfterTest, c.test))
        .stage(TestClassifier, TestClassifierStage::new(c.model.clone()))
        .stage(FixedIssueClassifier, FixedIssueClassifierStage::new(c.model.clone()))
        .stage(SuccessBranch, NoopStage)
        .stage(Responder, ResponderStage::new(c.model))
        // baseline, then retrieval
        .branch(Start, Router::NeedTest, to(BeforeTest), to(IssueToQuery))
        .edge(BeforeTest, to(IssueToQuery))
        .edge(IssueToQuery, to(ContextProvider))
        .branch(ContextProvider, Router::OnlyAnswer, to(Responder), to(RequireEditClassifier))
        .branch(RequireEditClassifier, Router::OnlyAnswer, to(Responder), to(CodeEditing))
        // edit and review
        .edge(CodeEditing, to(GitDiff))
        .edge(GitDiff, to(EditReviewer))
        .edge(EditReviewer, to(EditReviewClassifier))
        .branch(
            EditReviewClassifier,
            Router::ReviewApproved,
            to(BuildBranch),
            to(ResetReviewerMessages),
        )
        .edge(ResetReviewerMessages, to(ResetEditMessages))
        // verification
        .branch(BuildBranch, Router::NeedBuild, to(Build), to(TestBranch))
        .edge(Build, to(BuildClassifier))
        .edge(BuildClassifier, to(TestBranch))
        .branch(TestBranch, Router::NeedTest, to(AfterTest), to(SuccessBranch))
        .edge(AfterTest, to(TestClassifier))
        .edge(TestClassifier, to(FixedIssueClassifier))
        .edge(FixedIssueClassifier, to(SuccessBranch))
        .branch(SuccessBranch, Router::Success, to(Responder), to(ResetReviewerMessages))
        // retry
        .edge(ResetEditMessages, to(CodeEditing))
        .edge(Responder, Target::End)
        .build(c.checkpointer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::model::scripted::{flag, ScriptedModel};
    use crate::model::Message;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct FixedContext;

    #[async_trait]
    impl ContextRetriever for FixedContext {
        async fn retrieve(&self, _query: &str, _prior: &[Message]) -> Result<String> {
            Ok("parse() is defined in src/parser.py:10".to_string())
        }
    }

    /// Returns queued outputs in order, then repeats the last one.
    struct QueuedRunner {
        outputs: StdMutex<VecDeque<&'static str>>,
    }

    impl QueuedRunner {
        fn new(outputs: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                outputs: StdMutex::new(outputs.iter().copied().collect()),
            })
        }
    }

    #[async_trait]
    impl CommandRunner for QueuedRunner {
        async fn run(&self) -> Result<String> {
            let mut outputs = self.outputs.lock().unwrap();
            let out = if outputs.len() > 1 {
                outputs.pop_front()
            } else {
                outputs.front().copied()
            };
            Ok(out.unwrap_or_default().to_string())
        }

        async fn cleanup(&self) -> Result<()> {
            Ok(())
        }
    }

    struct FixedDiff;

    #[async_trait]
    impl DiffProvider for FixedDiff {
        async fn diff(&self) -> Result<String> {
            Ok("--- a/src/parser.py\n+++ b/src/parser.py\n-    raise\n+    return None\n".to_string())
        }
    }

    fn limits(max_edit_attempts: u32) -> EngineLimits {
        EngineLimits {
            max_tool_iterations: 5,
            max_edit_attempts,
            max_file_lines: 1000,
            call_timeout: Duration::from_secs(5),
        }
    }

    fn test_resolver(
        model: Arc<ScriptedModel>,
        tests: Arc<QueuedRunner>,
        checkpointer: Arc<dyn Checkpointer>,
        max_edit_attempts: u32,
    ) -> (IssueResolver, tempfile::TempDir) {
        resolver_with_build(
            model,
            QueuedRunner::new(&["build ok"]),
            tests,
            checkpointer,
            max_edit_attempts,
        )
    }

    fn resolver_with_build(
        model: Arc<ScriptedModel>,
        build: Arc<QueuedRunner>,
        tests: Arc<QueuedRunner>,
        checkpointer: Arc<dyn Checkpointer>,
        max_edit_attempts: u32,
    ) -> (IssueResolver, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let collaborators = Collaborators {
            model,
            retriever: Arc::new(FixedContext),
            build,
            test: tests,
            diff: Arc::new(FixedDiff),
            checkpointer,
        };
        let resolver = IssueResolver::new(tmp.path(), collaborators, limits(max_edit_attempts)).unwrap();
        (resolver, tmp)
    }

    fn request(run_test: bool) -> IssueRequest {
        IssueRequest {
            title: "parse() raises on empty input".to_string(),
            body: "Calling parse(\"\") raises instead of returning None.".to_string(),
            comments: vec![IssueComment {
                username: "erin".to_string(),
                comment: "Seen on main".to_string(),
            }],
            response_mode: ResponseMode::AnswerAndFix,
            run_build: false,
            run_test,
        }
    }

    #[tokio::test]
    async fn test_answer_without_edit_goes_straight_to_responder() {
        let model = Arc::new(
            ScriptedModel::new()
                .decide(RequireEditClassifierStage::SCHEMA, flag("require_edit", false))
                .reply("parse() returns None for empty input since 2.0, see src/parser.py:10"),
        );
        let (resolver, _tmp) = test_resolver(
            model.clone(),
            QueuedRunner::new(&[]),
            Arc::new(MemoryCheckpointer::new()),
            3,
        );

        let resolution = resolver.resolve_issue(request(false), None).await.unwrap();

        assert!(resolution.response.starts_with("parse() returns None"));
        assert!(resolution.patch.is_empty());
        assert_eq!(model.pending(), 0);

        let calls = model.calls();
        assert_eq!(calls.len(), 2);
        let responder_prompt = &calls[1].messages[0].content;
        assert!(responder_prompt.contains("parse() raises on empty input"));
        assert!(responder_prompt.contains("src/parser.py:10"));
        assert!(!responder_prompt.contains("Patch applied"));
        assert!(calls[1].tool_names.is_empty());
        assert!(uuid::Uuid::parse_str(&resolution.thread_id).is_ok());
    }

    #[tokio::test]
    async fn test_only_answer_mode_skips_classifier() {
        let model = Arc::new(ScriptedModel::new().reply("Here is how it works."));
        let (resolver, _tmp) = test_resolver(
            model.clone(),
            QueuedRunner::new(&[]),
            Arc::new(MemoryCheckpointer::new()),
            3,
        );
        let mut req = request(false);
        req.response_mode = ResponseMode::OnlyAnswer;

        let resolution = resolver
            .resolve_issue(req, Some("only-answer".to_string()))
            .await
            .unwrap();
        assert_eq!(resolution.thread_id, "only-answer");
        assert_eq!(resolution.response, "Here is how it works.");
        assert!(model.structured_calls(RequireEditClassifierStage::SCHEMA).is_empty());
    }

    #[tokio::test]
    async fn test_fix_verified_by_tests_reaches_responder() {
        let model = Arc::new(
            ScriptedModel::new()
                .decide(RequireEditClassifierStage::SCHEMA, flag("require_edit", true))
                .reply("Changed parse() to return None on empty input")
                .reply("VERDICT: APPROVE\n\nSUMMARY:\nLooks right.")
                .decide(
                    EditReviewClassifierStage::SCHEMA,
                    json!({"reviewer_approved": true, "reviewer_comments": "VERDICT: APPROVE"}),
                )
                .decide(
                    TestClassifierStage::SCHEMA,
                    json!({"exist_test": true, "command_summary": "pytest", "fail_log": ""}),
                )
                .decide(FixedIssueClassifierStage::SCHEMA, flag("fixed_issue", true))
                .reply("Fixed in the attached patch."),
        );
        let tests = QueuedRunner::new(&["FAIL: test_x", "PASS"]);
        let (resolver, _tmp) = test_resolver(
            model.clone(),
            tests,
            Arc::new(MemoryCheckpointer::new()),
            3,
        );

        let resolution = resolver.resolve_issue(request(true), None).await.unwrap();

        assert_eq!(resolution.response, "Fixed in the attached patch.");
        assert!(resolution.patch.contains("+    return None"));
        assert_eq!(model.pending(), 0);

        let fixed_call = &model.structured_calls(FixedIssueClassifierStage::SCHEMA)[0];
        let prompt = &fixed_call.messages[0].content;
        assert!(prompt.contains("Pre-patch test output:\nFAIL: test_x"));
        assert!(prompt.contains("Post-patch test output:\nPASS"));
    }

    #[tokio::test]
    async fn test_rejected_review_retries_with_fresh_channels() {
        let model = Arc::new(
            ScriptedModel::new()
                .decide(RequireEditClassifierStage::SCHEMA, flag("require_edit", true))
                .reply("first attempt")
                .reply("VERDICT: REQUEST_CHANGES")
                .decide(
                    EditReviewClassifierStage::SCHEMA,
                    json!({"reviewer_approved": false, "reviewer_comments": "Handle None too"}),
                )
                .reply("second attempt")
                .reply("VERDICT: APPROVE")
                .decide(
                    EditReviewClassifierStage::SCHEMA,
                    json!({"reviewer_approved": true, "reviewer_comments": "ok"}),
                )
                .reply("done"),
        );
        let (resolver, _tmp) = test_resolver(
            model.clone(),
            QueuedRunner::new(&[]),
            Arc::new(MemoryCheckpointer::new()),
            3,
        );

        let resolution = resolver.resolve_issue(request(false), None).await.unwrap();
        assert_eq!(resolution.response, "done");

        let calls = model.calls();
        // Second edit turn sees only its own human prompt, with the review feedback.
        let second_edit = &calls[4];
        assert_eq!(second_edit.messages.len(), 1);
        assert!(second_edit.messages[0].content.contains("Handle None too"));
        // Second review starts from an empty reviewer channel.
        assert_eq!(calls[5].messages.len(), 1);
    }

    fn reviewer_calls(model: &ScriptedModel) -> Vec<crate::model::scripted::RecordedCall> {
        model
            .calls()
            .into_iter()
            .filter(|c| c.system == crate::agent::prompt::EDIT_REVIEWER_SYSTEM)
            .collect()
    }

    fn approve(script: ScriptedModel, edit: &str) -> ScriptedModel {
        script
            .reply(edit)
            .reply("VERDICT: APPROVE")
            .decide(
                EditReviewClassifierStage::SCHEMA,
                json!({"reviewer_approved": true, "reviewer_comments": "VERDICT: APPROVE"}),
            )
    }

    #[tokio::test]
    async fn test_failing_tests_retry_with_fresh_edit_and_review() {
        let script = ScriptedModel::new()
            .decide(RequireEditClassifierStage::SCHEMA, flag("require_edit", true));
        let script = approve(script, "first attempt")
            .decide(
                TestClassifierStage::SCHEMA,
                json!({"exist_test": true, "command_summary": "pytest", "fail_log": "FAIL: test_x"}),
            )
            .decide(FixedIssueClassifierStage::SCHEMA, flag("fixed_issue", false));
        let script = approve(script, "second attempt")
            .decide(
                TestClassifierStage::SCHEMA,
                json!({"exist_test": true, "command_summary": "pytest", "fail_log": ""}),
            )
            .decide(FixedIssueClassifierStage::SCHEMA, flag("fixed_issue", true))
            .reply("Fixed on the second try.");
        let model = Arc::new(script);

        let checkpointer: Arc<dyn Checkpointer> = Arc::new(MemoryCheckpointer::new());
        let tests = QueuedRunner::new(&["FAIL: test_x", "FAIL: test_x", "PASS"]);
        let (resolver, _tmp) = test_resolver(model.clone(), tests, checkpointer.clone(), 3);

        let resolution = resolver
            .resolve_issue(request(true), Some("tests-retry".to_string()))
            .await
            .unwrap();
        assert_eq!(resolution.response, "Fixed on the second try.");
        assert_eq!(model.pending(), 0);

        let edits: Vec<_> = model
            .calls()
            .into_iter()
            .filter(|c| c.system == crate::agent::prompt::CODE_EDITING_SYSTEM)
            .collect();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[1].messages.len(), 1);
        let retry_prompt = &edits[1].messages[0].content;
        assert!(retry_prompt.contains("Test Status: FAILING"));
        assert!(retry_prompt.contains("FAIL: test_x"));
        assert!(retry_prompt.contains("The reported issue is not fixed"));
        assert!(retry_prompt.contains("Your previous edit"));

        let reviews = reviewer_calls(&model);
        assert_eq!(reviews.len(), 2);
        for review in &reviews {
            assert_eq!(review.messages.len(), 1);
            assert_eq!(review.messages.last().unwrap().role, crate::model::Role::Human);
        }

        let fixed_calls = model.structured_calls(FixedIssueClassifierStage::SCHEMA);
        assert!(fixed_calls[1].messages[0].content.contains("Post-patch test output:\nPASS"));

        let cp = checkpointer.load("tests-retry").await.unwrap().unwrap();
        assert!(cp.is_finished());
        assert_eq!(cp.state.edit_attempts, 1);
        assert!(cp.state.test_fail_log.is_empty());
    }

    #[tokio::test]
    async fn test_failing_build_retries_then_succeeds() {
        let script = ScriptedModel::new()
            .decide(RequireEditClassifierStage::SCHEMA, flag("require_edit", true));
        let script = approve(script, "first attempt").decide(
            BuildClassifierStage::SCHEMA,
            json!({
                "exist_build": true,
                "command_summary": "cargo build",
                "fail_log": "error[E0308]: mismatched types"
            }),
        );
        let script = approve(script, "second attempt")
            .decide(
                BuildClassifierStage::SCHEMA,
                json!({"exist_build": true, "command_summary": "cargo build", "fail_log": ""}),
            )
            .reply("Builds cleanly now.");
        let model = Arc::new(script);

        let checkpointer: Arc<dyn Checkpointer> = Arc::new(MemoryCheckpointer::new());
        let build = QueuedRunner::new(&["error[E0308]: mismatched types", "Finished dev"]);
        let (resolver, _tmp) = resolver_with_build(
            model.clone(),
            build,
            QueuedRunner::new(&[]),
            checkpointer.clone(),
            3,
        );

        let mut req = request(false);
        req.run_build = true;
        let resolution = resolver
            .resolve_issue(req, Some("build-retry".to_string()))
            .await
            .unwrap();
        assert_eq!(resolution.response, "Builds cleanly now.");
        assert_eq!(model.pending(), 0);
        assert!(model.structured_calls(TestClassifierStage::SCHEMA).is_empty());

        let build_calls = model.structured_calls(BuildClassifierStage::SCHEMA);
        assert_eq!(build_calls.len(), 2);
        assert_eq!(build_calls[0].messages[0].content, "error[E0308]: mismatched types");
        assert_eq!(build_calls[1].messages[0].content, "Finished dev");

        let edits: Vec<_> = model
            .calls()
            .into_iter()
            .filter(|c| c.system == crate::agent::prompt::CODE_EDITING_SYSTEM)
            .collect();
        assert_eq!(edits.len(), 2);
        assert!(edits[1].messages[0].content.contains("Build Status: FAILING"));
        assert!(edits[1].messages[0].content.contains("error[E0308]"));

        let reviews = reviewer_calls(&model);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[1].messages.len(), 1);

        let cp = checkpointer.load("build-retry").await.unwrap().unwrap();
        assert_eq!(cp.state.edit_attempts, 1);
        assert!(cp.state.build_fail_log.is_empty());
    }

    #[tokio::test]
    async fn test_retry_limit_is_fatal() {
        let mut script = ScriptedModel::new()
            .decide(RequireEditClassifierStage::SCHEMA, flag("require_edit", true));
        // Initial attempt plus one retry, both rejected.
        for _ in 0..2 {
            script = script
                .reply("attempt")
                .reply("VERDICT: REQUEST_CHANGES")
                .decide(
                    EditReviewClassifierStage::SCHEMA,
                    json!({"reviewer_approved": false, "reviewer_comments": "no"}),
                );
        }
        let (resolver, _tmp) = test_resolver(
            Arc::new(script),
            QueuedRunner::new(&[]),
            Arc::new(MemoryCheckpointer::new()),
            1,
        );

        let err = resolver.resolve_issue(request(false), None).await.unwrap_err();
        assert!(matches!(err, AppError::LoopLimit { limit: 1, .. }));
    }

    #[tokio::test]
    async fn test_failed_thread_resumes_and_finished_thread_is_replayed() {
        let checkpointer: Arc<dyn Checkpointer> = Arc::new(MemoryCheckpointer::new());

        // The script runs out at the responder, failing the invocation there.
        let first = Arc::new(
            ScriptedModel::new().decide(RequireEditClassifierStage::SCHEMA, flag("require_edit", false)),
        );
        let (resolver, _tmp) = test_resolver(first, QueuedRunner::new(&[]), checkpointer.clone(), 3);
        assert!(resolver
            .resolve_issue(request(false), Some("thread-1".to_string()))
            .await
            .is_err());
        let cp = checkpointer.load("thread-1").await.unwrap().unwrap();
        assert_eq!(cp.next, Some(StageId::Responder));

        // A fresh resolver on the same store resumes at the responder only.
        let second = Arc::new(ScriptedModel::new().reply("answer"));
        let (resolver, _tmp2) = test_resolver(second.clone(), QueuedRunner::new(&[]), checkpointer.clone(), 3);
        let resolution = resolver
            .resolve_issue(request(false), Some("thread-1".to_string()))
            .await
            .unwrap();
        assert_eq!(resolution.response, "answer");
        assert_eq!(second.calls().len(), 1);

        let replay = resolver
            .resolve_issue(request(false), Some("thread-1".to_string()))
            .await
            .unwrap();
        assert_eq!(replay, resolution);
        assert_eq!(second.calls().len(), 1);
    }
}
