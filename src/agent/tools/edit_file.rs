use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::tools::read_file::load_file;
use crate::agent::tools::{
    number_lines, require_line, require_param, verified_path, Tool, ToolOutput,
};
use crate::error::Result;
use crate::model::ToolDefinition;

/// Lines of context shown on each side of an edit.
const CONTEXT_LINES: usize = 10;

pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "edit_file".to_string(),
            description: "Replace a range of lines in an existing file with new content. start_line and end_line are 1-indexed and both inclusive. Returns the edited region with line numbers so you can verify the change.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "relative_path": {
                        "type": "string",
                        "description": "Relative path of the file to edit, e.g. foo/bar/test.py"
                    },
                    "start_line": {
                        "type": "integer",
                        "description": "First line to replace, 1-indexed, inclusive"
                    },
                    "end_line": {
                        "type": "integer",
                        "description": "Last line to replace, 1-indexed, inclusive"
                    },
                    "new_content": {
                        "type": "string",
                        "description": "Replacement text for the selected lines"
                    }
                },
                "required": ["relative_path", "start_line", "end_line", "new_content"]
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
        let new_content = require_param!(input, "new_content");

        let content = match load_file(workspace_root, path_str).await {
            Ok(c) => c,
            Err(e) => return Ok(e),
        };

        if end_line < start_line {
            return Ok(ToolOutput::Error(format!(
                "The end line number {end_line} must be greater than the start line number {start_line}."
            )));
        }

        let mut lines: Vec<String> = content.split_inclusive('\n').map(str::to_string).collect();
        // Keep the last line terminated so replacements never glue onto it.
        if let Some(last) = lines.last_mut() {
            if !last.ends_with('\n') {
                last.push('\n');
            }
        }

        if start_line > lines.len() + 1 {
            return Ok(ToolOutput::Error(format!(
                "The start line number {start_line} is past the end of {path_str} ({} lines).",
                lines.len()
            )));
        }

        let mut replacement = new_content.to_string();
        if !replacement.ends_with('\n') {
            replacement.push('\n');
        }
        let replacement: Vec<String> = replacement
            .split_inclusive('\n')
            .map(str::to_string)
            .collect();
        let inserted = replacement.len();

        let start = start_line - 1;
        let end = end_line.min(lines.len());
        lines.splice(start..end, replacement);

        let full_path = match verified_path(workspace_root, path_str) {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        if let Err(e) = tokio::fs::write(&full_path, lines.concat()).await {
            return Ok(ToolOutput::Error(format!("Failed to write {path_str}: {e}")));
        }

        tracing::debug!(path = %path_str, start_line, end_line, inserted, "Edited file");

        let context_start = start.saturating_sub(CONTEXT_LINES);
        let context_end = (start + inserted + CONTEXT_LINES).min(lines.len());
        let context = number_lines(
            lines[context_start..context_end].iter().map(String::as_str),
            context_start + 1,
        );

        Ok(ToolOutput::Success(format!(
            "The file {path_str} has been edited. The new content is:\n{context}"
        )))
    }
}
