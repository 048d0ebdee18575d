use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::context::ContextRetriever;
use crate::error::{AppError, Result};
use crate::model::Message;

/// Delegates retrieval to an external service.
///
/// Request: `POST {endpoint}` with `{"query": ..., "conversation": [...]}`.
/// Response: `{"summary": ...}`.
pub struct HttpContextRetriever {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct RetrievalRequest<'a> {
    query: &'a str,
    conversation: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct RetrievalResponse {
    summary: String,
}

impl HttpContextRetriever {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl ContextRetriever for HttpContextRetriever {
    async fn retrieve(&self, query: &str, prior: &[Message]) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RetrievalRequest {
                query,
                conversation: prior,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Collaborator(format!(
                "context service returned {status}: {body}"
            )));
        }

        let body: RetrievalResponse = response.json().await?;
        tracing::debug!(chars = body.summary.len(), "Retrieved context");
        Ok(body.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/retrieve")
    }

    #[tokio::test]
    async fn test_retrieve_posts_query_and_conversation() {
        let app = Router::new().route(
            "/retrieve",
            post(|Json(body): Json<Value>| async move {
                let summary = format!(
                    "{} / {} prior",
                    body["query"].as_str().unwrap_or_default(),
                    body["conversation"].as_array().map(Vec::len).unwrap_or(0)
                );
                Json(json!({ "summary": summary }))
            }),
        );
        let endpoint = serve(app).await;

        let retriever = HttpContextRetriever::new(&endpoint);
        let summary = retriever
            .retrieve("where is parse()", &[Message::human("earlier")])
            .await
            .unwrap();
        assert_eq!(summary, "where is parse() / 1 prior");
    }

    #[tokio::test]
    async fn test_retrieve_maps_error_status() {
        let app = Router::new().route(
            "/retrieve",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "index offline") }),
        );
        let endpoint = serve(app).await;

        let err = HttpContextRetriever::new(&endpoint)
            .retrieve("q", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Collaborator(_)));
        assert!(err.to_string().contains("index offline"));
    }
}
