pub mod engine;
pub mod prompt;
pub mod tools;

pub use engine::{AgentLoop, AgentRun};
