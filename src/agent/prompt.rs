use crate::workflow::state::{IssueComment, WorkflowState};

/// `username: comment` entries separated by blank lines.
pub fn format_comments(comments: &[IssueComment]) -> String {
    comments
        .iter()
        .map(|c| format!("{}: {}", c.username, c.comment))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Retrieval query built from the issue.
pub fn issue_query(state: &WorkflowState) -> String {
    format!(
        r#"A user has reported the following issue to the codebase:
Title:
{title}

Issue description:
{body}

Issue comments:
{comments}

Now, please help the user with the issue."#,
        title = state.issue_title,
        body = state.issue_body,
        comments = format_comments(&state.issue_comments),
    )
}

fn issue_block(state: &WorkflowState) -> String {
    format!(
        "ISSUE INFORMATION:\nTitle: {}\nDescription: {}\nComments: {}",
        state.issue_title,
        state.issue_body,
        format_comments(&state.issue_comments)
    )
}

pub fn build_status(state: &WorkflowState) -> String {
    if !state.run_build {
        "Build Status: Unknown (build check not enabled)".to_string()
    } else if state.exist_build == Some(false) {
        "Build Status: Unknown (no build system found)".to_string()
    } else if !state.build_fail_log.is_empty() {
        format!("Build Status: FAILING\nBuild Failure Log:\n{}", state.build_fail_log)
    } else {
        "Build Status: Passing".to_string()
    }
}

pub fn test_status(state: &WorkflowState) -> String {
    if !state.run_test {
        "Test Status: Unknown (test check not enabled)".to_string()
    } else if state.exist_test == Some(false) {
        "Test Status: Unknown (no test system found)".to_string()
    } else if !state.test_fail_log.is_empty() {
        format!("Test Status: FAILING\nTest Failure Log:\n{}", state.test_fail_log)
    } else {
        "Test Status: Passing".to_string()
    }
}

pub const CODE_EDITING_SYSTEM: &str = r#"You are a code editing agent. You implement precise changes that resolve a reported issue and fix any build or test failures caused by earlier attempts.

You receive the issue, a summary of relevant code retrieved from the codebase, the current build and test status, your previous patch if there was one, and reviewer feedback if the previous patch was rejected.

## Workflow
1. Read every file you intend to change with read_file or read_file_with_line_numbers. Never edit blind.
2. Fix build failures first, then test failures, then the issue itself.
3. Use edit_file for changes to existing files. Line ranges are 1-indexed and inclusive.
4. Re-read the edited region to confirm the result.
5. When you are done, reply with a short description of what you changed and no tool calls.

## Guidelines
- Make minimal, focused changes and follow the existing code style.
- Do not modify tests that fail on purpose to demonstrate the issue.
- When build or test status is unknown, keep changes conservative."#;

pub fn code_editing_human(state: &WorkflowState) -> String {
    let mut prompt = format!(
        "{issue}\n\nCONTEXT:\nRetrieved context summary:\n{summary}\n\nCURRENT STATUS:\n{build}\n{test}\n",
        issue = issue_block(state),
        summary = state.summary,
        build = build_status(state),
        test = test_status(state),
    );

    if !state.patch.is_empty() {
        prompt.push_str(&format!("\nYour previous edit:\n{}\n", state.patch));
    }
    if state.reviewer_approved == Some(false) && !state.reviewer_comments.is_empty() {
        prompt.push_str(&format!(
            "\nReviewer feedback on your previous edit:\n{}\n",
            state.reviewer_comments
        ));
    }

    prompt
}

pub const EDIT_REVIEWER_SYSTEM: &str = r#"You are a code reviewer. You review a patch generated to fix an issue. You can read files to check existing patterns or verify details of the change.

Focus on:
- Functionality: does the patch address the issue, and could it break something else?
- Code quality: critical problems such as wrong arguments, broken error handling, or races. Ignore naming nits.
- Scope: flag changes that touch unrelated areas without a reason.

Respond in this format:
VERDICT: APPROVE or REQUEST_CHANGES

SUMMARY:
<one paragraph>

ISSUES:
1. [Critical|Important|Minor] <issue>"#;

pub fn edit_reviewer_human(state: &WorkflowState) -> String {
    format!(
        "{issue}\n\nCONTEXT:\nRetrieved context summary:\n{summary}\n\nGENERATED PATCH:\n{patch}\n",
        issue = issue_block(state),
        summary = state.summary,
        patch = state.patch,
    )
}

pub const REVIEW_PARSER_SYSTEM: &str = r#"You convert a free-form code review into structured output.

Set reviewer_approved to true only when the verdict is APPROVE (or a clear variant such as APPROVED or LGTM). REQUEST_CHANGES, NEEDS_WORK, or a missing verdict means false.

Set reviewer_comments to the review text with its VERDICT, SUMMARY, and ISSUES sections preserved and redundant whitespace removed."#;

pub const REQUIRE_EDIT_SYSTEM: &str = r#"You decide whether an issue can be resolved by answering from the retrieved codebase context, or whether files (code, documentation, configuration) must change.

require_edit = false: questions about how something works, usage help, configuration questions, explanations of existing behavior.
require_edit = true: bug reports needing a fix, feature requests, documentation corrections, performance or security changes.

Decide only from the information provided. Do not attempt to solve the issue."#;

pub fn require_edit_human(state: &WorkflowState) -> String {
    format!(
        "ISSUE INFORMATION:\nTitle: {}\nBody: {}\nComments:\n{}\n\nCODEBASE CONTEXT:\n{}\n",
        state.issue_title,
        state.issue_body,
        format_comments(&state.issue_comments),
        state.summary
    )
}

pub const BUILD_SUMMARY_SYSTEM: &str = r#"You analyze the output of build commands run against a software project.

Return:
- exist_build: whether the project has a build system that the commands exercised.
- command_summary: the build system and the commands that were run, in order.
- fail_log: the build-breaking error messages if the build failed, verbatim. Use an empty string if the build succeeded. Leave out warnings."#;

pub const TEST_SUMMARY_SYSTEM: &str = r#"You analyze the output of test commands run against a software project.

Return:
- exist_test: whether the project has a test suite that the commands exercised.
- command_summary: the test framework and the commands that were run, in order.
- fail_log: the failing test names with their assertion or error messages, verbatim. Use an empty string if every test passed."#;

pub const FIXED_ISSUE_SYSTEM: &str = r#"You are a QA analyst. You compare test output from before and after a patch was applied, together with the issue that describes the bug, and decide whether the bug has been fixed.

Set fixed_issue to true only if the post-patch output shows the behavior described in the issue no longer occurs. Explain your decision in explanation."#;

pub fn fixed_issue_human(state: &WorkflowState) -> String {
    format!(
        "Pre-patch test output:\n{}\n\nPost-patch test output:\n{}\n\nIssue body:\n{}\n",
        state.before_test_output, state.after_test_output, state.issue_body
    )
}

pub const RESPONDER_SYSTEM: &str = r#"You write the reply that is posted on an issue. You have the issue discussion and a summary of relevant code retrieved from the codebase, and a patch if one was made.

Always:
- Reference specific files, line numbers, and snippets from the summary, as `path/to/file.ext:line`.
- Quote relevant code in fenced blocks with a language tag.
- Explain how the referenced code relates to the issue and give actionable next steps.
- If a patch is included, describe what it changes and why it resolves the issue.

Never:
- Make claims about code that is not in the summary or patch.
- Promise timelines.
- Thank the user for the context; it was retrieved automatically.

Write as a maintainer replying to the issue and output the reply only."#;

pub fn responder_human(state: &WorkflowState) -> String {
    let mut prompt = format!(
        "Issue title:\n{}\n\nIssue body:\n{}\n\nRetrieved relevant context summary:\n{}\n\nIssue comments:\n{}\n",
        state.issue_title,
        state.issue_body,
        state.summary,
        format_comments(&state.issue_comments)
    );
    if !state.patch.is_empty() {
        prompt.push_str(&format!("\nPatch applied to resolve the issue:\n{}\n", state.patch));
    }
    prompt
}
