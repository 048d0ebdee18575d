//! Stages that turn model judgement into routing flags.
//!
//! Each asks for a schema-constrained object. A payload that is not an object
//! is a [`AppError::Schema`] fault; a missing or unreadable flag falls back to
//! the conservative value for that decision.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::agent::prompt;
use crate::error::{AppError, Result};
use crate::model::{ChatModel, Message, OutputSchema};
use crate::workflow::graph::Stage;
use crate::workflow::state::{StateUpdate, WorkflowState};

type Payload = Map<String, Value>;

async fn decide(
    model: &dyn ChatModel,
    system: &str,
    human: String,
    schema: &OutputSchema,
) -> Result<Payload> {
    let value = model
        .invoke_structured(system, &[Message::human(human)], schema)
        .await?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Schema(format!(
            "`{}` payload must be a JSON object, got {other}",
            schema.name
        ))),
    }
}

/// Read a boolean flag, tolerating the string spellings models sometimes emit.
fn flag(payload: &Payload, key: &str) -> Option<bool> {
    match payload.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn text(payload: &Payload, key: &str) -> Option<String> {
    payload.get(key)?.as_str().map(str::to_string)
}

fn flag_schema(name: &str, description: &str, flag_name: &str, flag_description: &str) -> OutputSchema {
    OutputSchema {
        name: name.to_string(),
        description: description.to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                flag_name: { "type": "boolean", "description": flag_description },
                "explanation": { "type": "string", "description": "One or two sentences justifying the decision" }
            },
            "required": [flag_name]
        }),
    }
}

fn summary_schema(name: &str, exist_flag: &str, what: &str) -> OutputSchema {
    OutputSchema {
        name: name.to_string(),
        description: format!("Structured summary of a {what} run"),
        schema: json!({
            "type": "object",
            "properties": {
                exist_flag: {
                    "type": "boolean",
                    "description": format!("Whether the project has a {what} setup that was exercised")
                },
                "command_summary": {
                    "type": "string",
                    "description": format!("The {what} system and the commands that were run")
                },
                "fail_log": {
                    "type": "string",
                    "description": "Failure output, or an empty string if everything passed"
                }
            },
            "required": [exist_flag, "command_summary", "fail_log"]
        }),
    }
}

pub struct RequireEditClassifierStage {
    model: Arc<dyn ChatModel>,
}

impl RequireEditClassifierStage {
    pub const SCHEMA: &'static str = "require_edit_decision";

    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for RequireEditClassifierStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        let schema = flag_schema(
            Self::SCHEMA,
            "Whether resolving the issue requires editing files",
            "require_edit",
            "True if files must change; false if the issue can be answered from the context",
        );
        let payload = decide(
            self.model.as_ref(),
            prompt::REQUIRE_EDIT_SYSTEM,
            prompt::require_edit_human(state),
            &schema,
        )
        .await?;

        let require_edit = flag(&payload, "require_edit").unwrap_or_else(|| {
            tracing::warn!("Ambiguous require_edit decision, assuming an edit is needed");
            true
        });
        tracing::info!(require_edit, "Classified issue");

        Ok(StateUpdate {
            require_edit: Some(require_edit),
            ..Default::default()
        })
    }
}

pub struct EditReviewClassifierStage {
    model: Arc<dyn ChatModel>,
}

impl EditReviewClassifierStage {
    pub const SCHEMA: &'static str = "edit_review_decision";

    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for EditReviewClassifierStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        let review = state
            .edit_reviewer_messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let schema = OutputSchema {
            name: Self::SCHEMA.to_string(),
            description: "Structured form of a code review".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "reviewer_approved": {
                        "type": "boolean",
                        "description": "True only if the verdict approves the patch"
                    },
                    "reviewer_comments": {
                        "type": "string",
                        "description": "The cleaned-up review text"
                    }
                },
                "required": ["reviewer_approved", "reviewer_comments"]
            }),
        };
        let payload = decide(
            self.model.as_ref(),
            prompt::REVIEW_PARSER_SYSTEM,
            review.clone(),
            &schema,
        )
        .await?;

        let approved = flag(&payload, "reviewer_approved").unwrap_or_else(|| {
            tracing::warn!("Ambiguous review verdict, treating the patch as rejected");
            false
        });
        let comments = text(&payload, "reviewer_comments").unwrap_or(review);
        tracing::info!(approved, "Review classified");

        Ok(StateUpdate {
            reviewer_approved: Some(approved),
            reviewer_comments: Some(comments),
            ..Default::default()
        })
    }
}

/// Summarizes build output into `exist_build`, command summary and fail log.
pub struct BuildClassifierStage {
    model: Arc<dyn ChatModel>,
}

impl BuildClassifierStage {
    pub const SCHEMA: &'static str = "build_summary";

    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for BuildClassifierStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        let schema = summary_schema(Self::SCHEMA, "exist_build", "build");
        let payload = decide(
            self.model.as_ref(),
            prompt::BUILD_SUMMARY_SYSTEM,
            state.build_output.clone(),
            &schema,
        )
        .await?;

        let summary = VerificationSummary::decode(&payload, "exist_build", &state.build_output);
        tracing::info!(
            exist_build = summary.exists,
            failed = !summary.fail_log.is_empty(),
            "Build classified"
        );

        Ok(StateUpdate {
            exist_build: Some(summary.exists),
            build_command_summary: Some(summary.command_summary),
            build_fail_log: Some(summary.fail_log),
            ..Default::default()
        })
    }
}

/// Summarizes post-edit test output into `exist_test`, command summary and fail log.
pub struct TestClassifierStage {
    model: Arc<dyn ChatModel>,
}

impl TestClassifierStage {
    pub const SCHEMA: &'static str = "test_summary";

    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for TestClassifierStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        let schema = summary_schema(Self::SCHEMA, "exist_test", "test");
        let payload = decide(
            self.model.as_ref(),
            prompt::TEST_SUMMARY_SYSTEM,
            state.after_test_output.clone(),
            &schema,
        )
        .await?;

        let summary = VerificationSummary::decode(&payload, "exist_test", &state.after_test_output);
        tracing::info!(
            exist_test = summary.exists,
            failed = !summary.fail_log.is_empty(),
            "Tests classified"
        );

        Ok(StateUpdate {
            exist_test: Some(summary.exists),
            test_command_summary: Some(summary.command_summary),
            test_fail_log: Some(summary.fail_log),
            ..Default::default()
        })
    }
}

struct VerificationSummary {
    exists: bool,
    command_summary: String,
    fail_log: String,
}

impl VerificationSummary {
    /// An empty fail log means success, so an unreadable summary keeps the raw
    /// output as the log, or a fixed failure note when there was no output.
    fn decode(payload: &Payload, exist_flag: &str, raw_output: &str) -> Self {
        let exists = flag(payload, exist_flag);
        let fail_log = text(payload, "fail_log");

        match (exists, fail_log) {
            (Some(exists), Some(fail_log)) => Self {
                exists,
                command_summary: text(payload, "command_summary").unwrap_or_default(),
                fail_log,
            },
            _ => {
                tracing::warn!(flag = exist_flag, "Ambiguous verification summary, treating the run as failed");
                let fail_log = if raw_output.trim().is_empty() {
                    format!(
                        "Unreadable {} summary and no output was captured.",
                        exist_flag.trim_start_matches("exist_")
                    )
                } else {
                    raw_output.to_string()
                };
                Self {
                    exists: true,
                    command_summary: text(payload, "command_summary").unwrap_or_default(),
                    fail_log,
                }
            }
        }
    }
}

/// Compares before/after test output against the issue.
///
/// When the issue is judged unfixed and tests were requested, the explanation
/// is appended to `test_fail_log` so the success router sends the run back to
/// the edit loop.
pub struct FixedIssueClassifierStage {
    model: Arc<dyn ChatModel>,
}

impl FixedIssueClassifierStage {
    pub const SCHEMA: &'static str = "fixed_issue_decision";

    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Stage for FixedIssueClassifierStage {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate> {
        let schema = flag_schema(
            Self::SCHEMA,
            "Whether the patch fixed the reported bug",
            "fixed_issue",
            "True only if the post-patch output shows the bug no longer occurs",
        );
        let payload = decide(
            self.model.as_ref(),
            prompt::FIXED_ISSUE_SYSTEM,
            prompt::fixed_issue_human(state),
            &schema,
        )
        .await?;

        let fixed = flag(&payload, "fixed_issue").unwrap_or_else(|| {
            tracing::warn!("Ambiguous fixed_issue decision, treating the issue as unfixed");
            false
        });
        tracing::info!(fixed, "Fix verified");

        let mut update = StateUpdate {
            fixed_issue: Some(fixed),
            ..Default::default()
        };

        if !fixed && state.run_test {
            let explanation = text(&payload, "explanation")
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "the test output does not show the fix".to_string());
            let note = format!("The reported issue is not fixed: {explanation}");
            update.test_fail_log = Some(if state.test_fail_log.is_empty() {
                note
            } else {
                format!("{}\n\n{note}", state.test_fail_log)
            });
        }

        Ok(update)
    }
}
