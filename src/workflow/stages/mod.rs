//! Stage implementations wired together by [`crate::workflow::issue`].

pub mod classify;
pub mod context;
pub mod control;
pub mod edit;
pub mod respond;
pub mod verify;

pub use classify::{
    BuildClassifierStage, EditReviewClassifierStage, FixedIssueClassifierStage,
    RequireEditClassifierStage, TestClassifierStage,
};
pub use context::{ContextProviderStage, IssueToQueryStage};
pub use control::{NoopStage, ResetStage};
pub use edit::{CodeEditingStage, EditReviewerStage, GitDiffStage};
pub use respond::ResponderStage;
pub use verify::{VerifyKind, VerifyStage};
