pub mod channel;
pub mod checkpoint;
pub mod graph;
pub mod issue;
pub mod router;
pub mod stages;
pub mod state;

pub use issue::{IssueRequest, IssueResolver, Resolution};
