use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::tools::{require_param, verified_path, Tool, ToolOutput};
use crate::error::Result;
use crate::model::ToolDefinition;

pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "create_file".to_string(),
            description: "Create a new file with the given content. Missing parent directories are created automatically. Returns an error message if the file already exists.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "relative_path": {
                        "type": "string",
                        "description": "Relative path of the new file, e.g. foo/bar/test.py"
                    },
                    "content": {
                        "type": "string",
                        "description": "The content for the new file"
                    }
                },
                "required": ["relative_path", "content"]
            }),
        }
    }

    async fn execute(
        &self,
        workspace_root: &Path,
        input: serde_json::Value,
    ) -> Result<ToolOutput> {
        let path_str = require_param!(input, "relative_path");
        let content = require_param!(input, "content");

        let full_path = match verified_path(workspace_root, path_str) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };

        if full_path.exists() {
            return Ok(ToolOutput::Error(format!(
                "The file {path_str} already exists."
            )));
        }

        if let Some(parent) = full_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(ToolOutput::Error(format!(
                    "Failed to create parent directories: {e}"
                )));
            }
        }

        match tokio::fs::write(&full_path, content).await {
            Ok(()) => {
                tracing::debug!(path = %path_str, "Created file");
                Ok(ToolOutput::Success(format!(
                    "The file {path_str} has been created."
                )))
            }
            Err(e) => Ok(ToolOutput::Error(format!("Failed to create file: {e}"))),
        }
    }
}
