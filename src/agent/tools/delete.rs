use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::tools::{require_param, verified_path, Tool, ToolOutput};
use crate::error::Result;
use crate::model::ToolDefinition;

pub struct DeleteTool;

#[async_trait]
impl Tool for DeleteTool {
    fn name(&self) -> &str {
        "delete"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "delete".to_string(),
            description: "Delete a file or directory. Directories are deleted recursively. Returns an error message if the path doesn't exist.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "relative_path": {
                        "type": "string",
                        "description": "Relative path of the file or directory to delete"
                    }
                },
                "required": ["relative_path"]
            }),
        }
    }

    async fn execute(
        &self,
        workspace_root: &Path,
        input: serde_json::Value,
    ) -> Result<ToolOutput> {
        let path_str = require_param!(input, "relative_path");

        let full_path = match verified_path(workspace_root, path_str) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };

        if !full_path.exists() {
            return Ok(ToolOutput::Error(format!(
                "The file {path_str} does not exist."
            )));
        }

        if full_path.is_dir() {
            return match tokio::fs::remove_dir_all(&full_path).await {
                Ok(()) => Ok(ToolOutput::Success(format!(
                    "The directory {path_str} has been deleted."
                ))),
                Err(e) => Ok(ToolOutput::Error(format!("Failed to delete directory: {e}"))),
            };
        }

        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(ToolOutput::Success(format!(
                "The file {path_str} has been deleted."
            ))),
            Err(e) => Ok(ToolOutput::Error(format!("Failed to delete file: {e}"))),
        }
    }
}
