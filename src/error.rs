use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow graph error: {0}")]
    Graph(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Model API error: {0}")]
    ModelApi(String),

    #[error("Model API rate limited: {0}")]
    ModelRateLimited(String),

    #[error("Model API transient error: {0}")]
    ModelTransient(String),

    #[error("Structured output rejected: {0}")]
    Schema(String),

    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },

    #[error("{what} exceeded the limit of {limit} iterations")]
    LoopLimit { what: String, limit: u32 },

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transient failures may succeed when the same thread is re-invoked.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Timeout { .. } | AppError::ModelRateLimited(_) | AppError::ModelTransient(_)
        )
    }
}

impl From<git2::Error> for AppError {
    fn from(e: git2::Error) -> Self {
        AppError::Git(e.message().to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Bound an external call by `limit`, mapping expiry to [`AppError::Timeout`].
pub async fn with_timeout<T, F>(what: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(call = what, secs = limit.as_secs(), "External call timed out");
            Err(AppError::Timeout {
                what: what.to_string(),
                secs: limit.as_secs(),
            })
        }
    }
}
