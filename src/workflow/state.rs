use serde::{Deserialize, Serialize};

use crate::model::Message;
use crate::workflow::channel::Channel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub username: String,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Answer from retrieved context; never edit.
    OnlyAnswer,
    /// Answer, editing the codebase when the issue calls for it.
    #[default]
    AnswerAndFix,
}

/// Which channel a [`StateUpdate`] appends to or resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    ContextProvider,
    CodeEdit,
    EditReviewer,
}

/// Record threaded through every stage of one invocation.
///
/// Decision flags are `Option<bool>`: `None` means the deciding stage has not
/// run yet, which routers treat differently from `Some(false)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub issue_title: String,
    pub issue_body: String,
    pub issue_comments: Vec<IssueComment>,
    pub response_mode: ResponseMode,
    pub run_build: bool,
    pub run_test: bool,

    pub query: String,
    pub summary: String,
    pub patch: String,

    pub require_edit: Option<bool>,
    pub reviewer_approved: Option<bool>,
    pub reviewer_comments: String,

    pub exist_build: Option<bool>,
    pub build_command_summary: String,
    pub build_fail_log: String,
    pub build_output: String,

    pub exist_test: Option<bool>,
    pub test_command_summary: String,
    pub test_fail_log: String,
    pub before_test_output: String,
    pub after_test_output: String,
    pub fixed_issue: Option<bool>,

    pub edit_attempts: u32,
    pub issue_response: String,

    pub context_provider_messages: Channel,
    pub code_edit_messages: Channel,
    pub edit_reviewer_messages: Channel,
}

impl WorkflowState {
    pub fn channel(&self, id: ChannelId) -> &Channel {
        match id {
            ChannelId::ContextProvider => &self.context_provider_messages,
            ChannelId::CodeEdit => &self.code_edit_messages,
            ChannelId::EditReviewer => &self.edit_reviewer_messages,
        }
    }

    fn channel_mut(&mut self, id: ChannelId) -> &mut Channel {
        match id {
            ChannelId::ContextProvider => &mut self.context_provider_messages,
            ChannelId::CodeEdit => &mut self.code_edit_messages,
            ChannelId::EditReviewer => &mut self.edit_reviewer_messages,
        }
    }

    /// Merge a stage's partial update.
    ///
    /// Returned scalars replace prior values, resets run next, and channel
    /// appends run last so a stage can clear and refill in one update.
    pub fn apply(&mut self, update: StateUpdate) {
        fn set<T>(field: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *field = v;
            }
        }
        fn decide(field: &mut Option<bool>, value: Option<bool>) {
            if value.is_some() {
                *field = value;
            }
        }

        set(&mut self.query, update.query);
        set(&mut self.summary, update.summary);
        set(&mut self.patch, update.patch);
        decide(&mut self.require_edit, update.require_edit);
        decide(&mut self.reviewer_approved, update.reviewer_approved);
        set(&mut self.reviewer_comments, update.reviewer_comments);
        decide(&mut self.exist_build, update.exist_build);
        set(&mut self.build_command_summary, update.build_command_summary);
        set(&mut self.build_fail_log, update.build_fail_log);
        set(&mut self.build_output, update.build_output);
        decide(&mut self.exist_test, update.exist_test);
        set(&mut self.test_command_summary, update.test_command_summary);
        set(&mut self.test_fail_log, update.test_fail_log);
        set(&mut self.before_test_output, update.before_test_output);
        set(&mut self.after_test_output, update.after_test_output);
        decide(&mut self.fixed_issue, update.fixed_issue);
        set(&mut self.edit_attempts, update.edit_attempts);
        set(&mut self.issue_response, update.issue_response);

        for id in update.resets {
            self.channel_mut(id).clear();
        }
        for (id, messages) in update.appends {
            self.channel_mut(id).extend(messages);
        }
    }
}

/// Partial state returned by a stage. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub query: Option<String>,
    pub summary: Option<String>,
    pub patch: Option<String>,
    pub require_edit: Option<bool>,
    pub reviewer_approved: Option<bool>,
    pub reviewer_comments: Option<String>,
    pub exist_build: Option<bool>,
    pub build_command_summary: Option<String>,
    pub build_fail_log: Option<String>,
    pub build_output: Option<String>,
    pub exist_test: Option<bool>,
    pub test_command_summary: Option<String>,
    pub test_fail_log: Option<String>,
    pub before_test_output: Option<String>,
    pub after_test_output: Option<String>,
    pub fixed_issue: Option<bool>,
    pub edit_attempts: Option<u32>,
    pub issue_response: Option<String>,
    pub resets: Vec<ChannelId>,
    pub appends: Vec<(ChannelId, Vec<Message>)>,
}

impl StateUpdate {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn append(mut self, id: ChannelId, messages: Vec<Message>) -> Self {
        self.appends.push((id, messages));
        self
    }

    pub fn reset(mut self, id: ChannelId) -> Self {
        self.resets.push(id);
        self
    }
}
