pub mod grep;
pub mod http;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Message;

pub use grep::GrepContextRetriever;
pub use http::HttpContextRetriever;

/// Source of codebase context for an issue.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Summarize the code relevant to `query`. `prior` is the retrieval
    /// conversation so far, empty on the first call.
    async fn retrieve(&self, query: &str, prior: &[Message]) -> Result<String>;
}
