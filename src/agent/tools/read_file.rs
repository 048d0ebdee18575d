use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::tools::{
    number_lines, require_line, require_param, verified_path, Tool, ToolOutput,
};
use crate::error::Result;
use crate::model::ToolDefinition;

/// Load a file for a tool, or produce the error text the model sees.
pub(crate) async fn load_file(
    workspace_root: &Path,
    relative_path: &str,
) -> std::result::Result<String, ToolOutput> {
    let full_path = verified_path(workspace_root, relative_path)?;

    if !full_path.exists() {
        return Err(ToolOutput::Error(format!(
            "The file {relative_path} does not exist."
        )));
    }

    if !full_path.is_file() {
        return Err(ToolOutput::Error(format!(
            "The path {relative_path} is not a file."
        )));
    }

    tokio::fs::read_to_string(&full_path)
        .await
        .map_err(|e| ToolOutput::Error(format!("Failed to read {relative_path}: {e}")))
}

pub struct ReadFileTool {
    max_lines: usize,
}

impl ReadFileTool {
    pub fn new(max_lines: usize) -> Self {
        Self { max_lines }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".to_string(),
            description: format!(
                "Read a file from the codebase with line numbers prepended. Returns at most the first {} lines. Returns an error message if the file doesn't exist.",
                self.max_lines
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "relative_path": {
                        "type": "string",
                        "description": "Relative path of the file to read, e.g. foo/bar/test.py"
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

        let content = match load_file(workspace_root, path_str).await {
            Ok(c) => c,
            Err(e) => return Ok(e),
        };

        Ok(ToolOutput::Success(number_lines(
            content.lines().take(self.max_lines),
            1,
        )))
    }
}

/// Reads an inclusive, 1-indexed line range.
pub struct ReadFileRangeTool;

#[async_trait]
impl Tool for ReadFileRangeTool {
    fn name(&self) -> &str {
        "read_file_with_line_numbers"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file_with_line_numbers".to_string(),
            description: "Read a range of lines from a file with line numbers prepended. start_line and end_line are 1-indexed and both inclusive. Prefer chunks of 500-1000 lines for large files.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "relative_path": {
                        "type": "string",
                        "description": "Relative path of the file to read, e.g. foo/bar/test.py"
                    },
                    "start_line": {
                        "type": "integer",
                        "description": "First line to read, 1-indexed, inclusive"
                    },
                    "end_line": {
                        "type": "integer",
                        "description": "Last line to read, 1-indexed, inclusive"
                    }
                },
                "required": ["relative_path", "start_line", "end_line"]
            }),
        }
    }

    async fn execute(
        &self,
        workspace_root: &Path,
        input: serde_json::Value,
    ) -> Result<ToolOutput> {
        let path_str = require_param!(input, "relative_path");
        let start_line = require_line!(input, "start_line");
        let end_line = require_line!(input, "end_line");

        let content = match load_file(workspace_root, path_str).await {
            Ok(c) => c,
            Err(e) => return Ok(e),
        };

        if end_line < start_line {
            return Ok(ToolOutput::Error(format!(
                "The end line number {end_line} must be greater than the start line number {start_line}."
            )));
        }

        let selected = content
            .lines()
            .skip(start_line - 1)
            .take(end_line - start_line + 1);

        Ok(ToolOutput::Success(number_lines(selected, start_line)))
    }
}
