use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::workflow::issue::{new_thread_id, IssueRequest, IssueResolver, Resolution};

pub struct AppState {
    pub config: AppConfig,
    pub resolver: IssueResolver,
    in_flight: Mutex<HashSet<String>>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> crate::error::Result<Self> {
        let resolver = IssueResolver::from_config(&config).await?;
        Ok(Self::with_resolver(config, resolver))
    }

    pub fn with_resolver(config: AppConfig, resolver: IssueResolver) -> Self {
        Self {
            config,
            resolver,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Thread ids currently being resolved, sorted.
    pub fn in_flight_threads(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.in_flight_set().iter().cloned().collect();
        ids.sort();
        ids
    }

    fn in_flight_set(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark `thread_id` as running. `None` if it already is.
    fn claim(&self, thread_id: &str) -> Option<InFlight<'_>> {
        if !self.in_flight_set().insert(thread_id.to_string()) {
            return None;
        }
        Some(InFlight {
            state: self,
            thread_id: thread_id.to_string(),
        })
    }
}

/// Removes its thread id from the in-flight set when dropped, including when
/// the request future is cancelled.
struct InFlight<'a> {
    state: &'a AppState,
    thread_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.in_flight_set().remove(&self.thread_id);
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/issues/resolve", post(resolve_issue))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    #[serde(flatten)]
    pub issue: IssueRequest,
    #[serde(default)]
    pub thread_id: Option<String>,
}

async fn resolve_issue(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<Resolution>, (StatusCode, Json<Value>)> {
    let thread_id = body.thread_id.unwrap_or_else(new_thread_id);

    let Some(_claim) = state.claim(&thread_id) else {
        tracing::warn!(thread_id = %thread_id, "Thread is already being resolved");
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": format!("thread {thread_id} is already running") })),
        ));
    };

    match state
        .resolver
        .resolve_issue(body.issue, Some(thread_id.clone()))
        .await
    {
        Ok(resolution) => Ok(Json(resolution)),
        Err(e) => {
            tracing::error!(thread_id = %thread_id, error = %e, "Issue resolution failed");
            Err((
                status_for(&e),
                Json(json!({ "error": e.to_string(), "thread_id": thread_id })),
            ))
        }
    }
}

fn status_for(error: &AppError) -> StatusCode {
    if error.is_transient() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn health_check() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextRetriever;
    use crate::error::Result;
    use crate::model::scripted::ScriptedModel;
    use crate::model::Message;
    use crate::workflow::checkpoint::MemoryCheckpointer;
    use crate::workflow::issue::{Collaborators, EngineLimits};
    use crate::workspace::{CommandRunner, DiffProvider};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Nothing;

    #[async_trait]
    impl ContextRetriever for Nothing {
        async fn retrieve(&self, _query: &str, _prior: &[Message]) -> Result<String> {
            Ok("no context".to_string())
        }
    }

    #[async_trait]
    impl CommandRunner for Nothing {
        async fn run(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn cleanup(&self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl DiffProvider for Nothing {
        async fn diff(&self) -> Result<String> {
            Ok(String::new())
        }
    }

    fn config(project: &std::path::Path) -> AppConfig {
        serde_json::from_value(json!({
            "model": { "api_key": "test-key" },
            "project": { "path": project },
        }))
        .unwrap()
    }

    async fn serve(model: ScriptedModel) -> (String, Arc<AppState>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let collaborators = Collaborators {
            model: Arc::new(model),
            retriever: Arc::new(Nothing),
            build: Arc::new(Nothing),
            test: Arc::new(Nothing),
            diff: Arc::new(Nothing),
            checkpointer: Arc::new(MemoryCheckpointer::new()),
        };
        let limits = EngineLimits {
            max_tool_iterations: 5,
            max_edit_attempts: 3,
            max_file_lines: 1000,
            call_timeout: Duration::from_secs(5),
        };
        let resolver = IssueResolver::new(tmp.path(), collaborators, limits).unwrap();
        let state = Arc::new(AppState::with_resolver(config(tmp.path()), resolver));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), state, tmp)
    }

    #[tokio::test]
    async fn test_health() {
        let (base, _state, _tmp) = serve(ScriptedModel::new()).await;
        let body = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_resolve_only_answer() {
        let (base, state, _tmp) = serve(ScriptedModel::new().reply("Use --verbose.")).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/issues/resolve"))
            .json(&json!({
                "title": "How do I see debug output?",
                "body": "Nothing is printed.",
                "response_mode": "only_answer",
                "thread_id": "t-42"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let resolution: Resolution = resp.json().await.unwrap();
        assert_eq!(resolution.thread_id, "t-42");
        assert_eq!(resolution.response, "Use --verbose.");
        assert!(resolution.patch.is_empty());
        assert!(state.in_flight_threads().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_failure_is_500() {
        // No scripted responses left: the responder fails with a model error.
        let (base, _state, _tmp) = serve(ScriptedModel::new()).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/issues/resolve"))
            .json(&json!({
                "title": "t",
                "body": "b",
                "response_mode": "only_answer"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("no response left"));
        assert!(body["thread_id"].is_string());
    }

    #[test]
    fn test_transient_errors_map_to_503() {
        let timeout = AppError::Timeout {
            what: "model call".to_string(),
            secs: 300,
        };
        assert_eq!(status_for(&timeout), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(&AppError::Schema("bad".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_and_released_on_drop() {
        let (_base, state, _tmp) = serve(ScriptedModel::new()).await;
        let claim = state.claim("t-1").unwrap();
        assert!(state.claim("t-1").is_none());
        assert_eq!(state.in_flight_threads(), vec!["t-1".to_string()]);
        drop(claim);
        assert!(state.claim("t-1").is_some());
    }
}
