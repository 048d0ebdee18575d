use std::fmt;

use crate::workflow::state::{ResponseMode, WorkflowState};

/// Pure predicates that pick a branch edge. Each maps state to `true`/`false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Router {
    NeedBuild,
    NeedTest,
    OnlyAnswer,
    ReviewApproved,
    Success,
}

impl Router {
    pub fn route(self, state: &WorkflowState) -> bool {
        match self {
            Router::NeedBuild => state.run_build,
            Router::NeedTest => state.run_test,
            Router::OnlyAnswer => only_answer(state),
            Router::ReviewApproved => state.reviewer_approved == Some(true),
            Router::Success => success(state),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Router::NeedBuild => "need_build",
            Router::NeedTest => "need_test",
            Router::OnlyAnswer => "only_answer",
            Router::ReviewApproved => "review_approved",
            Router::Success => "success",
        }
    }
}

impl fmt::Display for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn only_answer(state: &WorkflowState) -> bool {
    if state.response_mode == ResponseMode::OnlyAnswer {
        return true;
    }
    // Undecided means the classifier still has to run.
    match state.require_edit {
        None => false,
        Some(require_edit) => !require_edit,
    }
}

fn success(state: &WorkflowState) -> bool {
    if !state.run_build && !state.run_test {
        return true;
    }
    if state.run_build && !state.build_fail_log.is_empty() {
        return false;
    }
    if state.run_test && !state.test_fail_log.is_empty() {
        return false;
    }
    true
}
